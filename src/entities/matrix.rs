// Two-level (name, parent-name) map
//
// Different cities and states can share a name, so they are keyed by their
// own name plus the name of their container. Iteration follows first
// insertion of each name, then first insertion of each parent under it.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct NameMatrix<V> {
    rows: Vec<(String, Vec<(String, V)>)>,
    positions: HashMap<String, usize>,
}

impl<V> NameMatrix<V> {
    pub fn new() -> Self {
        NameMatrix {
            rows: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str, parent: &str) -> bool {
        self.get(name, parent).is_some()
    }

    pub fn get(&self, name: &str, parent: &str) -> Option<&V> {
        let row = self.positions.get(name).map(|&i| &self.rows[i].1)?;
        row.iter().find(|(p, _)| p == parent).map(|(_, v)| v)
    }

    /// Insert or overwrite; overwriting keeps the entry's original position.
    pub fn insert(&mut self, name: &str, parent: &str, value: V) {
        let index = match self.positions.get(name) {
            Some(&i) => i,
            None => {
                self.rows.push((name.to_string(), Vec::new()));
                self.positions.insert(name.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };

        let row = &mut self.rows[index].1;
        match row.iter_mut().find(|(p, _)| p == parent) {
            Some(entry) => entry.1 = value,
            None => row.push((parent.to_string(), value)),
        }
    }

    /// Remove one entry; a name left with no parents disappears entirely.
    pub fn remove(&mut self, name: &str, parent: &str) -> Option<V> {
        let index = *self.positions.get(name)?;
        let row = &mut self.rows[index].1;
        let at = row.iter().position(|(p, _)| p == parent)?;
        let (_, value) = row.remove(at);

        if row.is_empty() {
            self.rows.remove(index);
            self.positions = self
                .rows
                .iter()
                .enumerate()
                .map(|(i, (n, _))| (n.clone(), i))
                .collect();
        }

        Some(value)
    }

    /// Every entry sharing `name`, under any parent, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<(&str, &V)> {
        match self.positions.get(name) {
            Some(&i) => self.rows[i].1.iter().map(|(p, v)| (p.as_str(), v)).collect(),
            None => Vec::new(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.iter().flat_map(|(_, row)| row.iter().map(|(_, v)| v))
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(|(_, row)| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<V> Default for NameMatrix<V> {
    fn default() -> Self {
        Self::new()
    }
}
