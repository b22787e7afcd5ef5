use assert_cmd::cargo::cargo_bin_cmd;

fn fixture(path: &str) -> String {
    format!("{}/tests/fixtures/{path}", env!("CARGO_MANIFEST_DIR"))
}

fn stdout_of(args: &[&str]) -> String {
    let mut cmd = cargo_bin_cmd!("rowscope");
    cmd.arg("--config").arg(fixture("configs/disks.toml")).args(args);
    let out = cmd.assert().success();
    String::from_utf8(out.get_output().stdout.clone()).expect("utf8")
}

#[test]
fn help_lists_viewer_flags() {
    let mut cmd = cargo_bin_cmd!("rowscope");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");

    assert!(stdout.contains("--snapshot"));
    assert!(stdout.contains("--sort-key"));
    assert!(stdout.contains("--list-screens"));
}

#[test]
fn list_screens_prints_processes_then_registry_headings() {
    let stdout = stdout_of(&["--list-screens"]);
    assert_eq!(stdout, "Processes\nDisks\nmixed\n");
}

#[test]
fn dynamic_screen_prints_one_line_per_instance() {
    let stdout = stdout_of(&["--screen", "disks"]);
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4, "{stdout}");
    assert!(lines[0].starts_with("screen=Disks row=header message=DISK"));
    assert!(lines[0].contains("READS▼"));
    assert!(lines[1].starts_with("screen=Disks row=0 message=nvme0n1"));
    assert!(lines[2].starts_with("screen=Disks row=1 message=sda"));
    assert!(lines[3].starts_with("screen=Disks row=2 message=sdb"));
    assert!(lines[3].contains("N/A"));
}

#[test]
fn sort_overrides_apply_to_the_selected_screen() {
    let stdout = stdout_of(&["--screen", "disks", "--sort-key", "disk", "--ascending"]);
    let names = stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split("message=").nth(1))
        .filter_map(|message| message.split_whitespace().next())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["nvme0n1", "sda", "sdb"]);
}

#[test]
fn mixed_domains_leave_the_table_empty_and_say_why() {
    let stdout = stdout_of(&["--screen", "mixed"]);
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[1].starts_with("screen=mixed row=status message="));
    assert!(lines[1].contains("different instance domains"));
}

#[test]
fn process_screen_sorts_by_cpu_and_filters_by_command() {
    let stdout = stdout_of(&[]);
    let commands = stdout
        .lines()
        .skip(1)
        .map(|line| line.trim_end().rsplit(' ').next().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(commands, vec!["bash", "sshd", "/sbin/init", "kthreadd"]);

    let filtered = stdout_of(&["--filter", "BASH"]);
    assert_eq!(filtered.lines().count(), 2, "{filtered}");
    assert!(filtered.lines().nth(1).is_some_and(|line| line.contains("bash")));
}

#[test]
fn run_log_records_scan_events() {
    let temp = tempfile::tempdir().expect("tempdir");
    let log = temp.path().join("run.jsonl");
    stdout_of(&["--screen", "disks", "--log", log.to_str().expect("utf8 path")]);

    let text = std::fs::read_to_string(&log).expect("log written");
    assert!(text.contains("\"event_type\":\"run.start\""));
    assert!(text.contains("\"event_type\":\"scan.filled\""));
    assert!(text.contains("\"event_type\":\"run.complete\""));
}

#[test]
fn invalid_config_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("rowscope");
    cmd.arg("--config").arg(fixture("configs/invalid.toml"));
    let out = cmd.assert().failure();
    let stderr = String::from_utf8(out.get_output().stderr.clone()).expect("utf8");
    assert!(stderr.contains("invalid config"));
}

#[test]
fn missing_snapshot_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("rowscope");
    cmd.arg("--snapshot").arg(fixture("snapshots/missing.json"));
    cmd.assert().failure();
}
