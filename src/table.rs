use serde::Serialize;
use sha2::{Digest, Sha256};

/// The whole persisted dataset: a header row plus data rows, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from a raw cell grid whose first row is the header.
    ///
    /// Short rows are padded with empty cells; cells past the header are kept
    /// under generated blank column names so nothing read from a store is lost.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut grid = grid.into_iter();
        let Some(mut columns) = grid.next() else {
            return Self::default();
        };

        let rows: Vec<Vec<String>> = grid
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        let widest = rows.iter().map(Vec::len).max().unwrap_or(0);
        while columns.len() < widest {
            columns.push(String::new());
        }

        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn to_grid(&self) -> Vec<Vec<String>> {
        if self.columns.is_empty() {
            return Vec::new();
        }
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.columns.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&[String]> {
        self.rows.last().map(Vec::as_slice)
    }

    /// Looks up a cell of `row` by column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }

    /// Appends one row given as `(column, value)` pairs.
    ///
    /// Columns the table does not have yet are added at the end and existing
    /// rows receive empty cells for them.
    pub fn append<I, K, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut row = vec![String::new(); self.columns.len()];
        for (column, value) in cells {
            let column = column.as_ref();
            let index = match self.columns.iter().position(|name| name == column) {
                Some(index) => index,
                None => {
                    self.columns.push(column.to_string());
                    for existing in &mut self.rows {
                        existing.push(String::new());
                    }
                    row.push(String::new());
                    self.columns.len() - 1
                }
            };
            row[index] = value.into();
        }
        self.rows.push(row);
    }

    /// SHA-256 over the full grid, used as the optimistic write token.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for row in self.to_grid() {
            for cell in row {
                hasher.update((cell.len() as u64).to_le_bytes());
                hasher.update(cell.as_bytes());
            }
            hasher.update([0xff]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn append_to_empty_table_creates_header() {
        let mut table = Table::default();
        table.append([("Company", "Thrive"), ("Entered By", "Jane")]);

        assert_eq!(table.columns(), ["Company", "Entered By"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "Entered By"), Some("Jane"));
    }

    #[test]
    fn append_unions_new_columns_and_pads_old_rows() {
        let mut table = Table::from_grid(grid(&[&["Company", "Spend"], &["ATI", "10.00"]]));
        table.append([("Company", "Thrive"), ("Notes", "launch")]);

        assert_eq!(table.columns(), ["Company", "Spend", "Notes"]);
        assert_eq!(table.rows()[0], ["ATI", "10.00", ""]);
        assert_eq!(table.rows()[1], ["Thrive", "", "launch"]);
    }

    #[test]
    fn from_grid_pads_short_rows_and_drops_blank_ones() {
        let table = Table::from_grid(grid(&[
            &["Company", "Spend", "Notes"],
            &["ATI"],
            &[],
            &["Thrive", "1.00", "x", "extra"],
        ]));

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().len(), 4);
        assert_eq!(table.rows()[0], ["ATI", "", "", ""]);
        assert_eq!(table.cell(1, "Notes"), Some("x"));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let empty = Table::default();
        let mut table = Table::default();
        assert_eq!(empty.fingerprint(), table.fingerprint());

        table.append([("Company", "ATI")]);
        let once = table.fingerprint();
        assert_ne!(once, empty.fingerprint());

        table.append([("Company", "ATI")]);
        assert_ne!(once, table.fingerprint());
    }

    #[test]
    fn fingerprint_is_not_fooled_by_cell_boundaries() {
        let a = Table::from_grid(grid(&[&["ab", "c"]]));
        let b = Table::from_grid(grid(&[&["a", "bc"]]));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
