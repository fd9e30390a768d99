use hashbrown::HashMap;

/// String interning table owned by a single compilation unit. Symbols from one
/// table are meaningless in another.
#[derive(Debug, Default, Clone)]
pub struct InterningTable {
    strings: Vec<Box<str>>,
    indices: HashMap<Box<str>, u32>,
}

impl InterningTable {
    pub fn get(&self, symbol: InternedSymbol) -> Option<&str> {
        self.strings.get(symbol.0 as usize).map(|s| &**s)
    }

    pub fn insert_if_absent(&mut self, string: &str) -> InternedSymbol {
        if let Some(index) = self.indices.get(string) {
            return InternedSymbol(*index);
        }

        let index = self.strings.len() as u32;

        self.strings.push(string.into());
        self.indices.insert(string.into(), index);

        InternedSymbol(index)
    }

    pub fn lookup(&self, string: &str) -> Option<InternedSymbol> {
        self.indices.get(string).copied().map(InternedSymbol)
    }
}

/// An index into a compilation unit's [`InterningTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = InterningTable::default();

        let a = table.insert_if_absent("counts");
        let b = table.insert_if_absent("input");
        let c = table.insert_if_absent("counts");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.get(b), Some("input"));
        assert_eq!(table.lookup("missing"), None);
    }
}
