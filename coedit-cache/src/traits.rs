//! Generic key→values caching abstraction, carried over from the on-disk
//! tile source cache this crate's disk backend is modeled on.

use anyhow::Result;
use std::fmt::Debug;
use std::io::{Read, Write};

/// Converts a value into a unique, deterministic, human-readable cache key
/// string. Used directly as (part of) an on-disk filename.
pub trait CacheKey: Debug {
	fn to_cache_key(&self) -> String;
}

impl CacheKey for String {
	fn to_cache_key(&self) -> String {
		self.clone()
	}
}

impl CacheKey for &str {
	fn to_cache_key(&self) -> String {
		(*self).to_string()
	}
}

/// A value a [`Cache`] can store and retrieve, serialized to a flat byte
/// stream so several entries can be concatenated inside one file.
pub trait CacheValue: Debug + Clone + PartialEq {
	fn write_to_cache(&self, writer: &mut impl Write) -> Result<()>;
	fn read_from_cache(reader: &mut impl Read) -> Result<Self>
	where
		Self: Sized;
}

impl CacheValue for Vec<u8> {
	fn write_to_cache(&self, writer: &mut impl Write) -> Result<()> {
		writer.write_all(&(self.len() as u32).to_le_bytes())?;
		writer.write_all(self)?;
		Ok(())
	}

	fn read_from_cache(reader: &mut impl Read) -> Result<Self> {
		let mut len_buf = [0u8; 4];
		reader.read_exact(&mut len_buf)?;
		let len = u32::from_le_bytes(len_buf) as usize;
		let mut buf = vec![0u8; len];
		reader.read_exact(&mut buf)?;
		Ok(buf)
	}
}

impl CacheValue for String {
	fn write_to_cache(&self, writer: &mut impl Write) -> Result<()> {
		self.clone().into_bytes().write_to_cache(writer)
	}

	fn read_from_cache(reader: &mut impl Read) -> Result<Self> {
		let bytes = Vec::<u8>::read_from_cache(reader)?;
		Ok(String::from_utf8_lossy(&bytes).into_owned())
	}
}

/// A key→values cache. Implementations own their own interior mutability so
/// callers can share one instance behind a plain `Arc` without an outer lock.
pub trait Cache<K: CacheKey, V: CacheValue>: Debug {
	fn contains_key(&self, key: &K) -> bool;
	fn get_clone(&self, key: &K) -> Result<Option<Vec<V>>>;
	fn remove(&self, key: &K) -> Result<Option<Vec<V>>>;
	fn insert(&self, key: &K, values: Vec<V>) -> Result<()>;
	fn append(&self, key: &K, values: Vec<V>) -> Result<()>;
	fn clean_up(&self);
}
