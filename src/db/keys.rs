use crate::ledger::{InverseLookup, KeyLedger};

/// Read-only view of the stored keys in position order.
#[derive(Clone, Copy, Debug)]
pub struct Keys<'a> {
    ledger: &'a KeyLedger,
    lookup: &'a InverseLookup,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(ledger: &'a KeyLedger, lookup: &'a InverseLookup) -> Self {
        Self { ledger, lookup }
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup.contains(key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.lookup.get(key)
    }

    pub fn get(&self, position: usize) -> Option<&'a str> {
        self.ledger.get(position)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a str> + 'a {
        self.ledger.iter()
    }

    pub fn as_slice(&self) -> &'a [String] {
        self.ledger.as_slice()
    }

    /// Ledger version; changes whenever the key set or order changes.
    pub fn version(&self) -> u64 {
        self.ledger.version()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ledger.as_slice().to_vec()
    }
}

impl<'a> IntoIterator for Keys<'a> {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.ledger
            .as_slice()
            .iter()
            .map(String::as_str as fn(&'a String) -> &'a str)
    }
}
