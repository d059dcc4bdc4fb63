use lazy_static::lazy_static;
use std::sync::RwLock;
pub use string_cache::DefaultAtom as Atom;

// Status banner lines are a small closed set ("LOADING MODEL...",
// "SHOW BOTH HANDS", per-trial summaries); interning them once lets the
// renderer key its rasterized text cache by a cheap id.
lazy_static! {
    static ref TEXT_INTERNER: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

/// Intern a status string and return its id
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    let mut v = TEXT_INTERNER.write().unwrap();
    match v.iter().position(|a| *a == atom) {
        Some(idx) => idx,
        None => {
            v.push(atom);
            v.len() - 1
        }
    }
}

/// Id of an already-interned string, if any
pub fn lookup_text(s: &str) -> Option<usize> {
    let atom = Atom::from(s);
    TEXT_INTERNER.read().unwrap().iter().position(|a| *a == atom)
}

/// Current count of unique texts
pub fn text_count() -> usize {
    TEXT_INTERNER.read().unwrap().len()
}

pub fn get_text(id: usize) -> String {
    TEXT_INTERNER.read().unwrap()[id].to_string()
}
