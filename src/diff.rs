//! Unix normal diff output.
//!
//! Produces the same text as `diff` without options: `a`/`d`/`c` hunks with
//! 1-based line ranges, `<`/`>` prefixed lines and the
//! `\ No newline at end of file` notice. Hunks are derived from a longest
//! common subsequence over whole lines, computed with the classic dynamic
//! program over suffixes.

/// Line terminator used for the diff output's own lines.
#[cfg(windows)]
pub const EOL: &str = "\r\n";
#[cfg(not(windows))]
pub const EOL: &str = "\n";

/// Renders the differences between two files given as lines that include
/// their terminators. Returns an empty string when the files are equal.
pub fn print_normal_diff(x: &[String], y: &[String]) -> String {
    let mut out = String::new();

    let m = x.len();
    let n = y.len();

    // opt[i][j] = length of the LCS of x[i..m] and y[j..n]
    let mut opt = vec![vec![0usize; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            if x[i] == y[j] {
                opt[i][j] = opt[i + 1][j + 1] + 1;
            } else {
                opt[i][j] = opt[i + 1][j].max(opt[i][j + 1]);
            }
        }
    }

    // Walk the table, buffering runs of non-matching lines and flushing a
    // hunk at each match.
    let mut i = 0;
    let mut j = 0;
    let mut x_lines: Vec<&str> = Vec::new();
    let mut y_lines: Vec<&str> = Vec::new();
    let mut x_range = (0usize, 0usize);
    let mut y_range = (0usize, 0usize);
    while i < m && j < n {
        if x[i] == y[j] {
            print_diff_lines(&mut out, &x_lines, &y_lines, x_range, y_range);
            x_lines.clear();
            y_lines.clear();
            i += 1;
            j += 1;
            x_range.0 = i;
            y_range.0 = j;
        } else if opt[i + 1][j] >= opt[i][j + 1] {
            x_range.1 = i;
            x_lines.push(&x[i]);
            i += 1;
        } else {
            y_range.1 = j;
            y_lines.push(&y[j]);
            j += 1;
        }
    }
    while i < m {
        x_range.1 = i;
        x_lines.push(&x[i]);
        i += 1;
    }
    while j < n {
        y_range.1 = j;
        y_lines.push(&y[j]);
        j += 1;
    }
    print_diff_lines(&mut out, &x_lines, &y_lines, x_range, y_range);
    out
}

fn print_diff_lines(
    out: &mut String,
    x_lines: &[&str],
    y_lines: &[&str],
    x_range: (usize, usize),
    y_range: (usize, usize),
) {
    if x_lines.is_empty() && y_lines.is_empty() {
        return;
    }
    if x_lines.is_empty() {
        // Insertion: the left number is the line after which the insert
        // happens, so it stays 0-based.
        out.push_str(&x_range.0.to_string());
        out.push('a');
        stringify_range(y_range, out);
        out.push_str(EOL);
        for line in y_lines {
            out.push_str("> ");
            format_line(line, out);
        }
    } else if y_lines.is_empty() {
        // Deletion, mirror image of insertion.
        stringify_range(x_range, out);
        out.push('d');
        out.push_str(&y_range.0.to_string());
        out.push_str(EOL);
        for line in x_lines {
            out.push_str("< ");
            format_line(line, out);
        }
    } else {
        stringify_range(x_range, out);
        out.push('c');
        stringify_range(y_range, out);
        out.push_str(EOL);
        for line in x_lines {
            out.push_str("< ");
            format_line(line, out);
        }
        out.push_str("---");
        out.push_str(EOL);
        for line in y_lines {
            out.push_str("> ");
            format_line(line, out);
        }
    }
}

fn stringify_range(range: (usize, usize), out: &mut String) {
    if range.0 == range.1 {
        out.push_str(&(range.0 + 1).to_string());
    } else {
        out.push_str(&(range.0 + 1).to_string());
        out.push(',');
        out.push_str(&(range.1 + 1).to_string());
    }
}

fn format_line(line: &str, out: &mut String) {
    let suffix_len = newline_suffix_len(line);
    if suffix_len > 0 {
        out.push_str(&line[..line.len() - suffix_len]);
    } else {
        out.push_str(line);
        out.push_str(EOL);
        out.push_str("\\ No newline at end of file");
    }
    out.push_str(EOL);
}

fn newline_suffix_len(line: &str) -> usize {
    if line.ends_with("\r\n") {
        2
    } else if line.ends_with('\n') || line.ends_with('\r') {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_equal_inputs_produce_empty_diff() {
        let x = lines(&["a\n", "b\n"]);
        assert_eq!(print_normal_diff(&x, &x), "");
        assert_eq!(print_normal_diff(&[], &[]), "");
    }

    #[test]
    fn test_single_change() {
        let x = lines(&["a\n"]);
        let y = lines(&["b\n"]);
        let expected = format!("1c1{EOL}< a{EOL}---{EOL}> b{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }

    #[test]
    fn test_insertion_at_start() {
        let x = lines(&["b\n"]);
        let y = lines(&["a\n", "b\n"]);
        let expected = format!("0a1{EOL}> a{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }

    #[test]
    fn test_deletion_range() {
        let x = lines(&["a\n", "b\n", "c\n"]);
        let y = lines(&["a\n"]);
        let expected = format!("2,3d1{EOL}< b{EOL}< c{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }

    #[test]
    fn test_change_with_ranges() {
        let x = lines(&["a\n", "b\n", "c\n", "d\n"]);
        let y = lines(&["a\n", "x\n", "y\n", "d\n"]);
        let expected = format!("2,3c2,3{EOL}< b{EOL}< c{EOL}---{EOL}> x{EOL}> y{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }

    #[test]
    fn test_missing_final_newline_notice() {
        let x = lines(&["a\n"]);
        let y = lines(&["a"]);
        let expected = format!("1c1{EOL}< a{EOL}---{EOL}> a{EOL}\\ No newline at end of file{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }

    #[test]
    fn test_terminator_differences_are_changes() {
        let x = lines(&["a\r\n"]);
        let y = lines(&["a\n"]);
        // The rendered hunk bodies look identical, but the lines differ.
        let expected = format!("1c1{EOL}< a{EOL}---{EOL}> a{EOL}");
        assert_eq!(print_normal_diff(&x, &y), expected);
    }
}
