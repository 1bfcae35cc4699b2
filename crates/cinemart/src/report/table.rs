/// Fixed-width text rendering for report rows, the non-JSON half of the
/// output contract.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|header| header.len()).collect::<Vec<_>>();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.len());
            }
        }
    }

    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>();

    let mut output = String::new();
    push_row(&mut output, headers.iter().copied(), &widths);
    push_row(&mut output, separator.iter().map(String::as_str), &widths);
    for row in rows {
        push_row(&mut output, row.iter().map(String::as_str), &widths);
    }
    output
}

#[must_use]
pub fn cell_opt_i64(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

#[must_use]
pub fn cell_opt_str(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[must_use]
pub fn cell_score(value: f64) -> String {
    format!("{value:.3}")
}

fn push_row<'cell>(
    output: &mut String,
    cells: impl Iterator<Item = &'cell str>,
    widths: &[usize],
) {
    let mut rendered = Vec::new();
    for (index, cell) in cells.enumerate() {
        let width = widths.get(index).copied().unwrap_or(cell.len());
        rendered.push(format!("{cell:<width$}"));
    }
    output.push_str(rendered.join("  ").trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::{cell_opt_i64, cell_score, render_table};

    #[test]
    fn columns_pad_to_the_widest_cell() {
        let rendered = render_table(
            &["genre", "title", "score"],
            &[
                vec!["Drama".to_string(), "Example".to_string(), "8.000".to_string()],
                vec!["Comedy".to_string(), "X".to_string(), "7.123".to_string()],
            ],
        );

        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("genre"));
        assert!(lines[1].starts_with("------"));
        assert!(lines[2].contains("Drama"));
        assert!(lines[3].contains("Comedy"));
    }

    #[test]
    fn cells_format_missing_values_and_scores() {
        assert_eq!(cell_opt_i64(None), "-");
        assert_eq!(cell_opt_i64(Some(1994)), "1994");
        assert_eq!(cell_score(7.1), "7.100");
    }
}
