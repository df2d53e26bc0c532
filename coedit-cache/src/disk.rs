//! On-disk cache backend: one file per key inside a cache-root directory.

use crate::traits::{Cache, CacheKey, CacheValue};
use anyhow::Result;
use coedit_derive::context;
use std::{
	fmt::Debug,
	fs::{File, OpenOptions, create_dir_all, remove_dir_all, remove_file, write},
	io::{Cursor, Read, Write},
	marker::PhantomData,
	path::{Path, PathBuf},
};

pub struct OnDiskCache<K: CacheKey, V: CacheValue> {
	path: PathBuf,
	_marker_k: PhantomData<K>,
	_marker_v: PhantomData<V>,
}

impl<K: CacheKey, V: CacheValue> OnDiskCache<K, V> {
	pub fn new(path: PathBuf) -> Self {
		create_dir_all(&path).ok();
		Self {
			path,
			_marker_k: PhantomData,
			_marker_v: PhantomData,
		}
	}

	#[must_use]
	pub fn root(&self) -> &Path {
		&self.path
	}

	fn get_entry_path(&self, key: &K) -> PathBuf {
		let name = key
			.to_cache_key()
			.bytes()
			.map(|b| {
				if (b as char).is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-' || b == b',' {
					(b as char).to_string()
				} else {
					format!("%{b:02x}")
				}
			})
			.collect::<String>();
		let mut p = self.path.clone();
		p.push(name);
		p
	}

	#[context("decoding {} bytes from cache buffer", buf.len())]
	fn buffer_to_values(buf: &[u8]) -> Result<Vec<V>> {
		let mut reader = Cursor::new(buf);
		let mut vec = Vec::new();
		while reader.position() < buf.len() as u64 {
			let value = V::read_from_cache(&mut reader)?;
			vec.push(value);
		}
		Ok(vec)
	}

	#[context("encoding {} values into cache buffer", values.len())]
	fn values_to_buffer(values: &[V]) -> Result<Vec<u8>> {
		let mut buf = Vec::new();
		for value in values {
			value.write_to_cache(&mut buf)?;
		}
		Ok(buf)
	}

	#[context("reading cache entry '{}'", entry_path.display())]
	fn read_file(&self, entry_path: &Path) -> Result<Option<Vec<V>>> {
		if entry_path.exists() {
			let mut file = File::open(entry_path)?;
			let mut data = Vec::new();
			file.read_to_end(&mut data)?;
			Ok(Some(Self::buffer_to_values(&data)?))
		} else {
			Ok(None)
		}
	}
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for OnDiskCache<K, V> {
	fn contains_key(&self, key: &K) -> bool {
		self.get_entry_path(key).exists()
	}

	#[context("reading cache for key '{}'", key.to_cache_key())]
	fn get_clone(&self, key: &K) -> Result<Option<Vec<V>>> {
		self.read_file(&self.get_entry_path(key))
	}

	#[context("removing cache entry for key '{}'", key.to_cache_key())]
	fn remove(&self, key: &K) -> Result<Option<Vec<V>>> {
		let entry_path = self.get_entry_path(key);
		let values = self.read_file(&entry_path)?;
		if entry_path.exists() {
			remove_file(&entry_path)?;
		}
		Ok(values)
	}

	#[context("writing values for key '{}'", key.to_cache_key())]
	fn insert(&self, key: &K, values: Vec<V>) -> Result<()> {
		let entry_path = self.get_entry_path(key);
		if let Some(parent) = entry_path.parent() {
			create_dir_all(parent)?;
		}
		write(entry_path, Self::values_to_buffer(&values)?)?;
		Ok(())
	}

	#[context("appending values for key '{}'", key.to_cache_key())]
	fn append(&self, key: &K, values: Vec<V>) -> Result<()> {
		let entry_path = self.get_entry_path(key);
		let buffer = Self::values_to_buffer(&values)?;
		if entry_path.exists() {
			OpenOptions::new().append(true).open(entry_path)?.write_all(&buffer)?;
		} else {
			if let Some(parent) = entry_path.parent() {
				create_dir_all(parent)?;
			}
			write(entry_path, buffer)?;
		}
		Ok(())
	}

	fn clean_up(&self) {
		remove_dir_all(&self.path).ok();
	}
}

impl<K: CacheKey, V: CacheValue> Debug for OnDiskCache<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OnDiskCache").field("path", &self.path).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn new_cache() -> (tempfile::TempDir, OnDiskCache<String, String>) {
		let dir = tempfile::tempdir().expect("tempdir");
		let cache_path = dir.path().join("cache");
		let cache = OnDiskCache::<String, String>::new(cache_path);
		(dir, cache)
	}

	fn v(s: &[&str]) -> Vec<String> {
		s.iter().map(|b| (*b).to_string()).collect()
	}

	#[test]
	fn get_entry_path_encodes_non_alnum() {
		let (_tmp, cache) = new_cache();
		let p1 = cache.get_entry_path(&"abc-_.,".to_string());
		assert_eq!(p1.file_name().unwrap().to_str().unwrap(), "abc-_.,");
		let p2 = cache.get_entry_path(&"a/b c".to_string());
		assert_eq!(p2.file_name().unwrap().to_str().unwrap(), "a%2fb%20c");
	}

	#[test]
	fn insert_get_append_remove_flow() {
		let (tmp, cache) = new_cache();
		let k = "key:1".to_string();
		assert!(!cache.contains_key(&k));
		assert!(cache.get_clone(&k).unwrap().is_none());

		cache.insert(&k, v(&["a", "b"])).unwrap();
		assert!(cache.contains_key(&k));
		assert_eq!(cache.get_clone(&k).unwrap(), Some(v(&["a", "b"])));

		cache.append(&k, v(&["c", "d"])).unwrap();
		assert_eq!(cache.get_clone(&k).unwrap(), Some(v(&["a", "b", "c", "d"])));

		let prev = cache.remove(&k).unwrap();
		assert_eq!(prev, Some(v(&["a", "b", "c", "d"])));
		assert!(!cache.contains_key(&k));

		let cache_dir = cache.path.clone();
		cache.clean_up();
		assert!(!cache_dir.exists());
		assert!(tmp.path().exists());
	}

	#[test]
	fn append_creates_file_if_missing() {
		let (_tmp, cache) = new_cache();
		let k = "new-key".to_string();
		cache.append(&k, v(&["v1"])).unwrap();
		assert!(cache.contains_key(&k));
		assert_eq!(cache.get_clone(&k).unwrap(), Some(v(&["v1"])));
	}
}
