//! Fixed-width numeric renderers shared by every row kind.
//!
//! Each helper appends exactly its documented number of columns to the line
//! (including the trailing separator space) so columns stay aligned no matter
//! how large the value grows. With `coloring` off every run is `Attr::Normal`.

use crate::rich::{Attr, RichLine};

pub const ONE_K: u64 = 1024;
pub const ONE_M: u64 = ONE_K * ONE_K;
pub const ONE_G: u64 = ONE_M * ONE_K;
pub const ONE_T: u64 = ONE_G * ONE_K;

pub const ONE_DECIMAL_K: u64 = 1000;
pub const ONE_DECIMAL_M: u64 = ONE_DECIMAL_K * ONE_DECIMAL_K;
pub const ONE_DECIMAL_G: u64 = ONE_DECIMAL_M * ONE_DECIMAL_K;

const UNIT_PREFIXES: [char; 5] = ['K', 'M', 'G', 'T', 'P'];

fn pick(coloring: bool, attr: Attr) -> Attr {
    if coloring {
        attr
    } else {
        Attr::Normal
    }
}

fn unit_attr(unit_index: usize) -> Attr {
    match unit_index {
        0 => Attr::Normal,
        1 => Attr::Megabytes,
        2 => Attr::Gigabytes,
        _ => Attr::LargeNumber,
    }
}

/// Takes a number in bytes (base 1024). Prints 6 columns.
pub fn print_bytes(out: &mut RichLine, number: u64, coloring: bool) {
    if number == u64::MAX {
        out.append(pick(coloring, Attr::Shadow), "  N/A ");
        return;
    }
    print_kbytes(out, number / ONE_K, coloring);
}

/// Takes a number in kilobytes (base 1024). Prints 6 columns.
pub fn print_kbytes(out: &mut RichLine, number: u64, coloring: bool) {
    if number == u64::MAX {
        out.append(pick(coloring, Attr::Shadow), "  N/A ");
        return;
    }

    if number < 1000 {
        out.append(Attr::Normal, &format!("{number:>5} "));
        return;
    }

    if number < 100_000 {
        // thousands digits take the megabyte colour so the magnitude stands out
        out.append(
            pick(coloring, Attr::Megabytes),
            &format!("{:>2}", number / 1000),
        );
        out.append(Attr::Normal, &format!("{:03} ", number % 1000));
        return;
    }

    let mut value = number as f64 / ONE_K as f64;
    let mut unit = 1;
    while value >= 1000.0 && unit < UNIT_PREFIXES.len() - 1 {
        value /= ONE_K as f64;
        unit += 1;
    }
    let text = if value < 99.95 {
        format!("{value:>4.1}{} ", UNIT_PREFIXES[unit])
    } else {
        format!("{:>4}{} ", value as u64, UNIT_PREFIXES[unit])
    };
    out.append(pick(coloring, unit_attr(unit)), &text);
}

/// Takes a number as a count (base 1000). Prints 12 columns.
pub fn print_count(out: &mut RichLine, number: u64, coloring: bool) {
    if number == u64::MAX {
        out.append(pick(coloring, Attr::Shadow), "        N/A ");
        return;
    }

    if number >= 100 * ONE_DECIMAL_G {
        let mut scaled = number / ONE_DECIMAL_K;
        let mut suffix = 0;
        while scaled >= 10 * ONE_DECIMAL_G && suffix < UNIT_PREFIXES.len() - 1 {
            scaled /= ONE_DECIMAL_K;
            suffix += 1;
        }
        out.append(
            pick(coloring, Attr::LargeNumber),
            &format!("{scaled:>10}{} ", UNIT_PREFIXES[suffix]),
        );
        return;
    }

    let attr = if number == 0 {
        Attr::Shadow
    } else if number >= ONE_DECIMAL_G {
        Attr::Gigabytes
    } else if number >= ONE_DECIMAL_M {
        Attr::Megabytes
    } else {
        Attr::Normal
    };
    out.append(pick(coloring, attr), &format!("{number:>11} "));
}

/// Takes time in hundredths of a second. Prints 9 columns.
pub fn print_time(out: &mut RichLine, total_hundredths: u64, coloring: bool) {
    let total_seconds = total_hundredths / 100;
    let total_minutes = total_seconds / 60;
    let total_hours = total_minutes / 60;
    let seconds = total_seconds % 60;
    let minutes = total_minutes % 60;

    let base = if total_hundredths == 0 {
        pick(coloring, Attr::Shadow)
    } else {
        Attr::Normal
    };

    if total_minutes < 60 {
        let hundredths = total_hundredths % 100;
        out.append(
            base,
            &format!("{total_minutes:>2}:{seconds:02}.{hundredths:02} "),
        );
        return;
    }

    if total_hours < 100 {
        out.append(pick(coloring, Attr::Megabytes), &format!("{total_hours:>2}h"));
        out.append(base, &format!("{minutes:02}:{seconds:02} "));
        return;
    }

    let total_days = total_hours / 24;
    let hours = total_hours % 24;
    if total_days < 10 {
        out.append(pick(coloring, Attr::Gigabytes), &format!("{total_days}d"));
        out.append(pick(coloring, Attr::Megabytes), &format!("{hours:02}h"));
        out.append(base, &format!("{minutes:02}m "));
        return;
    }

    if total_days < 100 {
        out.append(pick(coloring, Attr::Gigabytes), &format!("{total_days:>2}d"));
        out.append(pick(coloring, Attr::Megabytes), &format!("{hours:02}h   "));
        return;
    }

    if total_days < 100_000 {
        out.append(
            pick(coloring, Attr::LargeNumber),
            &format!("{total_days:>7}d "),
        );
        return;
    }

    out.append(
        pick(coloring, Attr::LargeNumber),
        &format!("{:>7}y ", total_days / 365),
    );
}

/// Takes a rate in bare units (base 1024) per second. Prints 12 columns.
pub fn print_rate(out: &mut RichLine, rate: f64, coloring: bool) {
    if rate.is_nan() || rate < 0.0 {
        out.append(pick(coloring, Attr::Shadow), "        N/A ");
    } else if rate < 0.005 {
        out.append(pick(coloring, Attr::Shadow), &format!("{rate:>7.2} B/s "));
    } else if rate < ONE_K as f64 {
        out.append(Attr::Normal, &format!("{rate:>7.2} B/s "));
    } else if rate < ONE_M as f64 {
        out.append(
            Attr::Normal,
            &format!("{:>7.2} K/s ", rate / ONE_K as f64),
        );
    } else if rate < ONE_G as f64 {
        out.append(
            pick(coloring, Attr::Megabytes),
            &format!("{:>7.2} M/s ", rate / ONE_M as f64),
        );
    } else if rate < ONE_T as f64 {
        out.append(
            pick(coloring, Attr::LargeNumber),
            &format!("{:>7.2} G/s ", rate / ONE_G as f64),
        );
    } else {
        out.append(
            pick(coloring, Attr::LargeNumber),
            &format!("{:>7.2} T/s ", rate / ONE_T as f64),
        );
    }
}

/// Renders a percentage right-aligned in `width` columns plus a separator.
/// A value above 99.9 in a 4-column field is shown as a plain "100".
pub fn print_percentage(value: f32, width: usize) -> (String, Attr) {
    if value.is_nan() || value < 0.0 {
        return (format!("{:>width$} ", "N/A"), Attr::Shadow);
    }
    let attr = if value < 0.05 {
        Attr::Shadow
    } else if value >= 99.9 {
        Attr::Megabytes
    } else {
        Attr::Normal
    };
    if width == 4 && value > 99.9 {
        return (format!("{:>width$.0} ", 100.0), attr);
    }
    (format!("{value:>width$.1} "), attr)
}

/// Writes `content` clipped or padded to `width` columns, then a separator.
pub fn print_left_aligned_field(out: &mut RichLine, attr: Attr, content: &str, width: usize) {
    let clipped = content.chars().take(width).collect::<String>();
    out.append(attr, &format!("{clipped:<width$} "));
}
