use crate::errors::HprofHistoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub alignment: Alignment,
}

impl ColumnHeader {
    pub fn new(name: &str, alignment: Alignment) -> Self {
        ColumnHeader {
            name: name.to_string(),
            alignment,
        }
    }
}

/// Fixed width text table, every cell is padded by one space on each side.
#[derive(Debug)]
pub struct Table {
    headers: Vec<ColumnHeader>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<ColumnHeader>, rows: Vec<Vec<String>>) -> Result<Self, HprofHistoError> {
        if let Some(row) = rows.iter().find(|row| row.len() != headers.len()) {
            return Err(HprofHistoError::TableShape {
                expected: headers.len(),
                actual: row.len(),
            });
        }
        Ok(Table { headers, rows })
    }

    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                self.rows
                    .iter()
                    .map(|row| row[index].chars().count())
                    .fold(header.name.chars().count(), usize::max)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut table = String::new();
        render_border(&mut table, &widths);
        let header_cells = self.headers.iter().map(|h| (h.name.as_str(), Alignment::Center));
        render_row(&mut table, &widths, header_cells);
        render_border(&mut table, &widths);
        for row in &self.rows {
            let cells = row
                .iter()
                .zip(&self.headers)
                .map(|(cell, header)| (cell.as_str(), header.alignment));
            render_row(&mut table, &widths, cells);
        }
        render_border(&mut table, &widths);
        table
    }
}

fn render_border(table: &mut String, widths: &[usize]) {
    for width in widths {
        table.push('+');
        table.push_str(&"-".repeat(width + 2));
    }
    table.push_str("+\n");
}

fn render_row<'a>(
    table: &mut String,
    widths: &[usize],
    cells: impl Iterator<Item = (&'a str, Alignment)>,
) {
    for ((cell, alignment), width) in cells.zip(widths) {
        table.push('|');
        table.push_str(&padded_cell(cell, width + 2, alignment));
    }
    table.push_str("|\n");
}

fn padded_cell(value: &str, width: usize, alignment: Alignment) -> String {
    let padding = width.saturating_sub(value.chars().count());
    match alignment {
        Alignment::Left => format!(" {value}{}", " ".repeat(padding.saturating_sub(1))),
        Alignment::Right => format!("{}{value} ", " ".repeat(padding.saturating_sub(1))),
        Alignment::Center => {
            // odd padding leaves the extra space on the right
            let left = padding / 2;
            format!("{}{value}{}", " ".repeat(left), " ".repeat(padding - left))
        }
    }
}
