use keyscope_core::CollectionMember;
use keyscope_core::table::{Alignment, ColumnSpec, cell_content};

/// Cells of a member row, in column order.
pub fn member_cells<M: CollectionMember>(member: &M) -> Vec<String> {
    vec![member.member_key().to_string(), member.value_text()]
}

/// Plain-text table. Columns without a label (actions) are skipped and cells
/// are cut to `max_cell_chars`.
pub fn render_table(columns: &[ColumnSpec], rows: &[Vec<String>], max_cell_chars: usize) -> String {
    let shown: Vec<(usize, &ColumnSpec)> = columns
        .iter()
        .enumerate()
        .filter(|(_, column)| !column.label.is_empty())
        .collect();

    let cell = |row: &Vec<String>, index: usize| -> String {
        row.get(index)
            .map(|text| cell_content(text, max_cell_chars).replace('\n', " "))
            .unwrap_or_default()
    };

    let widths: Vec<usize> = shown
        .iter()
        .map(|(index, column)| {
            rows.iter()
                .map(|row| cell(row, *index).chars().count())
                .chain(std::iter::once(column.label.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = shown
        .iter()
        .zip(&widths)
        .map(|((_, column), width)| pad(&column.label, *width, column.alignment))
        .collect();
    out.push_str(header.join("  ").trim_end());
    out.push('\n');

    for row in rows {
        let line: Vec<String> = shown
            .iter()
            .zip(&widths)
            .map(|((index, column), width)| pad(&cell(row, *index), *width, column.alignment))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }

    out
}

fn pad(text: &str, width: usize, alignment: Alignment) -> String {
    let fill = width.saturating_sub(text.chars().count());
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(fill)),
        Alignment::Right => format!("{}{}", " ".repeat(fill), text),
        Alignment::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}
