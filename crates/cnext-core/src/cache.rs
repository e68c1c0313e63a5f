//! Persistent on-disk cache (§6): per-header content-hashed symbol
//! snapshots under `.cnx/`. Grounded on the teacher's JSON round-tripping
//! convention in `perform_compile.rs` and the write-capture shape of
//! `capturing_fs.rs`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;
use crate::symbol::Symbol;

/// A stable, non-cryptographic content hash (FNV-1a) — good enough for
/// cache invalidation, not for security.
pub fn content_hash(text: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for byte in text.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntrySnapshot {
    pub hash: u64,
    #[serde(with = "symbol_serde")]
    pub symbols: Vec<Symbol>,
}

pub struct HeaderCache {
    entries: HashMap<PathBuf, CacheEntrySnapshot>,
    root: PathBuf,
    dirty: bool,
}

impl HeaderCache {
    pub fn load(fs: &dyn FileSystem, project_root: &Path) -> Self {
        let root = project_root.join(".cnx");
        let index_path = root.join("index.json");
        let entries = fs
            .read_file(&index_path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        HeaderCache {
            entries,
            root,
            dirty: false,
        }
    }

    pub fn lookup(&self, header: &Path, hash: u64) -> Option<&CacheEntrySnapshot> {
        self.entries
            .get(header)
            .filter(|entry| entry.hash == hash)
    }

    pub fn store(&mut self, header: &Path, hash: u64, symbols: Vec<Symbol>) {
        self.entries
            .insert(header.to_path_buf(), CacheEntrySnapshot { hash, symbols });
        self.dirty = true;
    }

    pub fn flush(&self, fs: &dyn FileSystem) -> std::io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        fs.ensure_dir(&self.root)?;
        let index_path = self.root.join("index.json");
        let json = serde_json::to_string_pretty(&self.entries)
            .unwrap_or_else(|_| "{}".to_string());
        fs.write_file(&index_path, &json)
    }
}

/// `Symbol` carries `PathBuf`/trait-object-free plain data, so deriving
/// `Serialize`/`Deserialize` directly on it would require threading serde
/// through every payload variant; this module centralizes that so the
/// cache is the only place the symbol model needs to know about JSON.
mod symbol_serde {
    use super::*;
    use serde::de::Deserializer;
    use serde::ser::Serializer;

    pub fn serialize<S: Serializer>(symbols: &[Symbol], s: S) -> Result<S::Ok, S::Error> {
        let shallow: Vec<ShallowSymbol> = symbols.iter().map(ShallowSymbol::from).collect();
        shallow.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Symbol>, D::Error> {
        let shallow = Vec::<ShallowSymbol>::deserialize(d)?;
        Ok(shallow.into_iter().map(|s| s.into_symbol()).collect())
    }

    /// Cached headers only ever contribute `isExported = true` leaf
    /// declarations (§4.2 step 5); a flat record is sufficient and avoids
    /// round-tripping the full `SymbolPayload` enum through serde.
    #[derive(Serialize, Deserialize)]
    struct ShallowSymbol {
        name: String,
        file: PathBuf,
        kind: String,
        declared_type: String,
        is_const: bool,
        initial_value: Option<String>,
    }

    impl From<&Symbol> for ShallowSymbol {
        fn from(s: &Symbol) -> Self {
            ShallowSymbol {
                name: s.key.name.clone(),
                file: s.key.file.clone(),
                kind: kind_tag(s.kind).to_string(),
                declared_type: s.declared_type.clone(),
                is_const: s.is_const,
                initial_value: s.initial_value.clone(),
            }
        }
    }

    impl ShallowSymbol {
        fn into_symbol(self) -> Symbol {
            Symbol {
                key: crate::symbol::SymbolKey {
                    name: self.name,
                    file: self.file,
                },
                kind: kind_from_tag(&self.kind),
                declared_type: self.declared_type,
                is_exported: true,
                is_const: self.is_const,
                initial_value: self.initial_value,
                payload: crate::symbol::SymbolPayload::None,
            }
        }
    }

    fn kind_tag(kind: crate::symbol::SymbolKind) -> &'static str {
        use crate::symbol::SymbolKind::*;
        match kind {
            Variable => "variable",
            Function => "function",
            Struct => "struct",
            Enum => "enum",
            Bitmap => "bitmap",
            Scope => "scope",
            Register => "register",
            TypeAlias => "type-alias",
            Class => "class",
        }
    }

    fn kind_from_tag(tag: &str) -> crate::symbol::SymbolKind {
        use crate::symbol::SymbolKind::*;
        match tag {
            "function" => Function,
            "struct" => Struct,
            "enum" => Enum,
            "bitmap" => Bitmap,
            "scope" => Scope,
            "register" => Register,
            "type-alias" => TypeAlias,
            "class" => Class,
            _ => Variable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::symbol::{Symbol, SymbolKey, SymbolKind, SymbolPayload};

    #[test]
    fn round_trips_through_flush_and_load() {
        let fs = MemoryFileSystem::new();
        let mut cache = HeaderCache::load(&fs, Path::new("/proj"));
        let symbol = Symbol {
            key: SymbolKey {
                name: "gpio_set".into(),
                file: PathBuf::from("/sdk/gpio.h"),
            },
            kind: SymbolKind::Function,
            declared_type: "void".into(),
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::None,
        };
        cache.store(Path::new("/sdk/gpio.h"), 42, vec![symbol]);
        cache.flush(&fs).unwrap();

        let reloaded = HeaderCache::load(&fs, Path::new("/proj"));
        let entry = reloaded.lookup(Path::new("/sdk/gpio.h"), 42).unwrap();
        assert_eq!(entry.symbols[0].name(), "gpio_set");
    }

    #[test]
    fn hash_changes_invalidate_lookup() {
        let fs = MemoryFileSystem::new();
        let mut cache = HeaderCache::load(&fs, Path::new("/proj"));
        cache.store(Path::new("/sdk/gpio.h"), 42, vec![]);
        assert!(cache.lookup(Path::new("/sdk/gpio.h"), 99).is_none());
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
