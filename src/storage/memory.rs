//! Chained-bucket in-memory storage engine.
//!
//! Entries live in `digest mod bucket_count` buckets; each bucket is a list
//! of colliding `(Key, Value)` pairs scanned linearly with byte-equality.
//! The table starts at 1024 buckets and doubles once at construction; it
//! does not grow afterwards.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;

use crate::storage::{EngineError, Key, StorageEngine, Value};

const INITIAL_BUCKET_COUNT: usize = 1024;

pub struct MemoryEngine {
    table: Mutex<BucketTable>,
}

struct BucketTable {
    buckets: Vec<Vec<(Key, Value)>>,
}

impl BucketTable {
    fn with_bucket_count(count: usize) -> Self {
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, Vec::new);

        BucketTable { buckets }
    }

    fn bucket_index(&self, key: &Key) -> usize {
        (key.digest() % self.buckets.len() as u64) as usize
    }

    /// Doubles the bucket count and moves every entry to the bucket its
    /// digest selects under the new size.
    fn expand_and_rehash(&mut self) {
        let mut expanded = BucketTable::with_bucket_count(self.buckets.len() * 2);

        for bucket in self.buckets.drain(..) {
            for (key, value) in bucket {
                let index = expanded.bucket_index(&key);
                expanded.buckets[index].push((key, value));
            }
        }

        *self = expanded;
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let mut table = BucketTable::with_bucket_count(INITIAL_BUCKET_COUNT);
        table.expand_and_rehash();

        MemoryEngine {
            table: Mutex::new(table),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        MemoryEngine::new()
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    async fn get(&self, key: &Key) -> Result<Value, EngineError> {
        let table = self.table.lock();
        let bucket = &table.buckets[table.bucket_index(key)];

        for (candidate, value) in bucket {
            if candidate == key {
                return Ok(value.clone());
            }
        }

        Err(EngineError::KeyNotFound)
    }

    async fn set(&self, key: Key, value: Value) -> Result<(), EngineError> {
        let mut table = self.table.lock();
        let index = table.bucket_index(&key);
        let bucket = &mut table.buckets[index];

        for (candidate, stored) in bucket.iter_mut() {
            if *candidate == key {
                *stored = value;
                return Ok(());
            }
        }

        bucket.push((key, value));
        Ok(())
    }

    async fn del(&self, key: &Key) -> Result<(), EngineError> {
        let mut table = self.table.lock();
        let index = table.bucket_index(key);
        let bucket = &mut table.buckets[index];

        match bucket.iter().position(|(candidate, _)| candidate == key) {
            Some(entry) => {
                bucket.remove(entry);
                Ok(())
            }
            None => Err(EngineError::KeyNotFound),
        }
    }

    async fn exists(&self, key: &Key) -> Result<bool, EngineError> {
        let table = self.table.lock();
        let bucket = &table.buckets[table.bucket_index(key)];

        Ok(bucket.iter().any(|(candidate, _)| candidate == key))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<Key>, EngineError> {
        let pattern = glob_to_regex(pattern)?;
        let table = self.table.lock();

        let mut keys = Vec::new();
        for bucket in &table.buckets {
            for (key, _) in bucket {
                if pattern.is_match(&String::from_utf8_lossy(key.bytes())) {
                    keys.push(key.clone());
                }
            }
        }

        Ok(keys)
    }

    async fn dump(&self) -> Result<Vec<(Key, Value)>, EngineError> {
        let table = self.table.lock();

        let mut entries = Vec::new();
        for bucket in &table.buckets {
            entries.extend(bucket.iter().cloned());
        }

        Ok(entries)
    }
}

/// Translates a glob into an anchored regex. `*` matches any run of
/// characters; everything else, including `?` and brackets, is literal.
fn glob_to_regex(pattern: &str) -> Result<Regex, EngineError> {
    let translated = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("^{translated}$")).map_err(|e| EngineError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &[u8]) -> Key {
        Key::new(bytes.to_vec())
    }

    fn value(bytes: &[u8]) -> Value {
        Value::new(bytes.to_vec())
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let engine = MemoryEngine::new();

        engine.set(key(b"foo"), value(b"bar")).await.unwrap();

        assert_eq!(engine.get(&key(b"foo")).await.unwrap(), value(b"bar"));
        assert!(engine.exists(&key(b"foo")).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let engine = MemoryEngine::new();

        assert_eq!(
            engine.get(&key(b"missing")).await,
            Err(EngineError::KeyNotFound)
        );
        assert!(!engine.exists(&key(b"missing")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let engine = MemoryEngine::new();

        engine.set(key(b"foo"), value(b"bar")).await.unwrap();
        engine.del(&key(b"foo")).await.unwrap();

        assert!(!engine.exists(&key(b"foo")).await.unwrap());
        assert_eq!(engine.get(&key(b"foo")).await, Err(EngineError::KeyNotFound));
        assert_eq!(engine.del(&key(b"foo")).await, Err(EngineError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_one_entry() {
        let engine = MemoryEngine::new();

        engine.set(key(b"foo"), value(b"one")).await.unwrap();
        engine.set(key(b"foo"), value(b"two")).await.unwrap();

        assert_eq!(engine.get(&key(b"foo")).await.unwrap(), value(b"two"));

        let matches = engine.keys("*").await.unwrap();
        let found = matches.iter().filter(|k| k.bytes() == b"foo").count();
        assert_eq!(found, 1);
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let engine = MemoryEngine::new();

        for name in [&b"foo"[..], b"foobar", b"bar"] {
            engine.set(key(name), value(b"x")).await.unwrap();
        }

        let collect = |keys: Vec<Key>| {
            let mut names: Vec<Vec<u8>> = keys.into_iter().map(Key::into_bytes).collect();
            names.sort();
            names
        };

        assert_eq!(
            collect(engine.keys("foo*").await.unwrap()),
            vec![b"foo".to_vec(), b"foobar".to_vec()]
        );
        assert_eq!(
            collect(engine.keys("*").await.unwrap()),
            vec![b"bar".to_vec(), b"foo".to_vec(), b"foobar".to_vec()]
        );
        assert_eq!(collect(engine.keys("bar").await.unwrap()), vec![b"bar".to_vec()]);
        assert!(engine.keys("nothing*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_treats_other_metacharacters_as_literals() {
        let engine = MemoryEngine::new();

        engine.set(key(b"foo"), value(b"x")).await.unwrap();
        engine.set(key(b"fo?"), value(b"x")).await.unwrap();

        // '?' is not a wildcard; it only matches itself.
        let matches = engine.keys("fo?").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bytes(), b"fo?");
    }

    #[tokio::test]
    async fn test_dump_returns_every_entry() {
        let engine = MemoryEngine::new();

        engine.set(key(b"a"), value(b"1")).await.unwrap();
        engine.set(key(b"b"), value(b"2")).await.unwrap();

        let mut entries = engine.dump().await.unwrap();
        entries.sort_by(|(left, _), (right, _)| left.bytes().cmp(right.bytes()));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.bytes(), b"a");
        assert_eq!(entries[0].1.bytes(), b"1");
        assert_eq!(entries[1].0.bytes(), b"b");
        assert_eq!(entries[1].1.bytes(), b"2");
    }

    #[test]
    fn test_expand_and_rehash_moves_every_entry() {
        let mut table = BucketTable::with_bucket_count(4);

        let entries: Vec<(Key, Value)> = (0..32)
            .map(|i| {
                (
                    Key::new(format!("key-{i}").into_bytes()),
                    Value::new(format!("value-{i}").into_bytes()),
                )
            })
            .collect();

        for (key, value) in &entries {
            let index = table.bucket_index(key);
            table.buckets[index].push((key.clone(), value.clone()));
        }

        table.expand_and_rehash();
        assert_eq!(table.buckets.len(), 8);

        for (key, value) in &entries {
            let bucket = &table.buckets[table.bucket_index(key)];
            let found = bucket
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, stored)| stored);
            assert_eq!(found, Some(value), "entry {:?} lost", key.bytes());
        }
    }

    #[test]
    fn test_glob_translation() {
        let test_cases = vec![
            ("*", "abc", true),
            ("*", "", true),
            ("foo*", "foo", true),
            ("foo*", "foobar", true),
            ("foo*", "barfoo", false),
            ("*bar", "foobar", true),
            ("f*o", "fo", true),
            ("f*o", "foooo", true),
            ("f.o", "fxo", false),
            ("f.o", "f.o", true),
        ];

        for (pattern, input, expected) in test_cases {
            let regex = glob_to_regex(pattern).unwrap();
            assert_eq!(
                regex.is_match(input),
                expected,
                "pattern {pattern} against {input}"
            );
        }
    }
}
