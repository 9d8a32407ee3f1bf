//! Discovered dependencies and the ways they leave the engine.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::io;

/// Names one column of one relation.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ColumnIdentifier {
    /// The relation's name.
    pub relation: String,
    /// The column's name.
    pub column: String,
    /// The column's position in the relation.
    pub index: usize,
}

impl ColumnIdentifier {
    /// The name to show for this column, with or without the relation name in front.
    pub fn display_name(&self, qualified: bool) -> String {
        if qualified {
            format!("{}.{}", self.relation, self.column)
        } else {
            self.column.clone()
        }
    }
}

impl fmt::Display for ColumnIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.column)
    }
}

/// A minimal functional dependency `lhs → rhs` that holds in the scanned rows.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FunctionalDependency {
    /// The determining columns, in column order.
    pub lhs: Vec<ColumnIdentifier>,
    /// The determined column.
    pub rhs: ColumnIdentifier,
}

impl FunctionalDependency {
    fn lhs_names(&self, qualified: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .lhs
            .iter()
            .map(|column| column.display_name(qualified))
            .collect();
        names.sort();
        names
    }
}

impl fmt::Display for FunctionalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] --> {}",
            self.lhs_names(false).join(", "),
            self.rhs.display_name(false)
        )
    }
}

/// Receives each discovered dependency as soon as the run is finished with it.
pub trait ResultReceiver {
    /// Accepts one dependency. Returning an error aborts the run.
    fn receive(&mut self, dependency: FunctionalDependency) -> Result<()>;
}

impl ResultReceiver for Vec<FunctionalDependency> {
    fn receive(&mut self, dependency: FunctionalDependency) -> Result<()> {
        self.push(dependency);
        Ok(())
    }
}

impl<F: FnMut(FunctionalDependency)> ResultReceiver for F {
    fn receive(&mut self, dependency: FunctionalDependency) -> Result<()> {
        self(dependency);
        Ok(())
    }
}

/// Writes dependencies as text, one line per left-hand side:
///
/// ```text
/// [A, B] --> C, D
/// ```
///
/// Names on both sides are sorted alphabetically, and so are the lines, so the output doesn't
/// depend on the order in which dependencies were found. Nothing is written until
/// [`TextWriter::finish`].
pub struct TextWriter<W> {
    out: W,
    qualified: bool,
    groups: BTreeMap<Vec<String>, Vec<String>>,
}

impl<W: io::Write> TextWriter<W> {
    /// Creates a writer. If `qualified` is set, columns are written as `relation.column`.
    pub fn new(out: W, qualified: bool) -> Self {
        TextWriter {
            out,
            qualified,
            groups: BTreeMap::new(),
        }
    }

    /// Writes every buffered line and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        for (lhs, mut rhs) in std::mem::take(&mut self.groups) {
            rhs.sort();
            rhs.dedup();
            writeln!(self.out, "[{}] --> {}", lhs.join(", "), rhs.join(", "))?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: io::Write> ResultReceiver for TextWriter<W> {
    fn receive(&mut self, dependency: FunctionalDependency) -> Result<()> {
        let lhs = dependency.lhs_names(self.qualified);
        self.groups
            .entry(lhs)
            .or_insert_with(Vec::new)
            .push(dependency.rhs.display_name(self.qualified));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, index: usize) -> ColumnIdentifier {
        ColumnIdentifier {
            relation: "people".to_string(),
            column: name.to_string(),
            index,
        }
    }

    fn fd(lhs: &[(&str, usize)], rhs: (&str, usize)) -> FunctionalDependency {
        FunctionalDependency {
            lhs: lhs.iter().map(|&(name, index)| column(name, index)).collect(),
            rhs: column(rhs.0, rhs.1),
        }
    }

    #[test]
    fn groups_and_sorts_lines() {
        let mut writer = TextWriter::new(Vec::new(), false);
        writer.receive(fd(&[("zip", 2), ("age", 0)], ("city", 1))).unwrap();
        writer.receive(fd(&[("name", 3)], ("zip", 2))).unwrap();
        writer.receive(fd(&[("age", 0), ("zip", 2)], ("birth", 4))).unwrap();
        writer.receive(fd(&[], ("country", 5))).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "[] --> country\n[age, zip] --> birth, city\n[name] --> zip\n"
        );
    }

    #[test]
    fn qualified_names() {
        let mut writer = TextWriter::new(Vec::new(), true);
        writer.receive(fd(&[("name", 3)], ("zip", 2))).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(text, "[people.name] --> people.zip\n");
    }

    #[test]
    fn closures_receive_results() {
        let mut seen = Vec::new();
        {
            let mut receiver = |dependency: FunctionalDependency| seen.push(dependency.to_string());
            receiver.receive(fd(&[("b", 1), ("a", 0)], ("c", 2))).unwrap();
        }
        assert_eq!(seen, vec!["[a, b] --> c".to_string()]);
    }
}
