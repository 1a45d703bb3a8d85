use std::io::{self, Write};

/// One row of query output as column/value pairs, kept in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    columns: Vec<(String, String)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.columns.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ResultRow::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

pub fn write_query<W: Write>(out: &mut W, query: &str) -> io::Result<()> {
    writeln!(out, "QUERY: {query}")?;
    out.flush()
}

pub fn write_row<W: Write>(out: &mut W, row: &ResultRow) -> io::Result<()> {
    for (name, value) in row.iter() {
        writeln!(out, "KEY: {name}, VAL: {value}")?;
    }
    out.flush()
}
