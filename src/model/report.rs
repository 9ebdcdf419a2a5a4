use serde::{Deserialize, Serialize};

/// Ordered Local Storm Reports as loaded from the source CSV.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ReportTable {
    pub headers: Vec<String>,

    pub rows: Vec<Vec<String>>,

    /// Position of the free-text remark in `headers`.
    pub remark_column: usize,
}

impl ReportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Remark texts in row order; short rows give an empty remark.
    pub fn remarks(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(self.remark_column).cloned().unwrap_or_default())
            .collect()
    }
}
