//! Plain-text rendering of a listed page for the CLI.
use crate::config::Resource;
use crate::model::Record;
use crate::session::CurrencyFormat;
use crate::viewmodel::ListSnapshot;

/// Render `snap` as aligned columns followed by a paging/counters footer.
///
/// Columns come from the resource config; without any, the first row's
/// fields are shown. Numeric cells in `money_columns` go through `currency`.
pub fn render(res: &Resource, snap: &ListSnapshot<Record>, currency: &CurrencyFormat) -> String {
    let columns: Vec<String> = if res.columns.is_empty() {
        snap.items
            .first()
            .map(|r| r.fields.keys().cloned().collect())
            .unwrap_or_default()
    } else {
        res.columns.clone()
    };

    let rows: Vec<Vec<String>> = snap
        .items
        .iter()
        .map(|record| {
            let mut row = vec![record.id.to_string()];
            for col in &columns {
                let cell = match record.number_field(col) {
                    Some(n) if res.money_columns.contains(col) => currency.format(n),
                    _ => record.display_field(col),
                };
                row.push(cell);
            }
            row
        })
        .collect();

    let mut header = vec!["id".to_string()];
    header.extend(columns.iter().cloned());
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&header));
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&format!(
        "Page {}/{}  Total: {}  Active: {}  Inactive: {}\n",
        snap.page,
        snap.total_pages,
        snap.counters.total,
        snap.counters.active,
        snap.counters.inactive
    ));
    out
}
