//! The deduplicated contact store and visited set.

use crate::company::company_name_for;
use crate::error::Result;
use harvest_core::types::canonical_email;
use harvest_core::ContactRecord;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Header row of the persisted file.
pub const HEADER: [&str; 4] = ["Company", "Email", "Phone", "Website"];

#[derive(Debug, Clone)]
struct Entry {
    company: String,
    email: String,
    source_url: String,
    listing_url: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Keyed by canonical (lowercased) email
    records: HashMap<String, Entry>,
    /// First phone seen per source URL
    phones: HashMap<String, String>,
    visited: HashSet<String>,
}

impl Inner {
    fn sorted_records(&self) -> Vec<ContactRecord> {
        let mut records: Vec<ContactRecord> = self
            .records
            .values()
            .map(|entry| ContactRecord {
                company: entry.company.clone(),
                email: entry.email.clone(),
                phone: self.phones.get(&entry.source_url).cloned(),
                source_url: entry.source_url.clone(),
                listing_url: entry.listing_url.clone(),
            })
            .collect();
        records.sort_by_cached_key(|r| (r.company.to_lowercase(), r.email.to_lowercase()));
        records
    }
}

/// In-memory contact records backed by a CSV file.
///
/// All state sits behind one lock, so `record`, `mark_visited` and `flush`
/// can be called from any number of concurrent workers.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl DedupStore {
    /// Open the store at `path`, replaying the file if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            inner: Mutex::new(Inner::default()),
        };
        store.load_existing()?;
        Ok(store)
    }

    /// Path of the persisted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_existing(&self) -> Result<()> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut inner = self.lock();
        let mut skipped = 0usize;
        for row in reader.records() {
            let row = match row {
                Ok(row) if row.len() >= HEADER.len() => row,
                Ok(_) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable row in {}: {}", self.path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            let (company, email, phone, website) = (&row[0], &row[1], &row[2], &row[3]);

            if !website.is_empty() {
                inner.visited.insert(website.to_string());
                if !phone.is_empty() {
                    inner
                        .phones
                        .entry(website.to_string())
                        .or_insert_with(|| phone.to_string());
                }
            }

            if email.is_empty() {
                continue;
            }
            inner
                .records
                .entry(canonical_email(email))
                .or_insert_with(|| Entry {
                    company: if company.is_empty() {
                        company_name_for(website, email)
                    } else {
                        company.to_string()
                    },
                    email: email.to_string(),
                    source_url: website.to_string(),
                    listing_url: None,
                });
        }

        tracing::info!(
            records = inner.records.len(),
            visited = inner.visited.len(),
            skipped,
            "Loaded existing records from {}",
            self.path.display()
        );
        Ok(())
    }

    /// Record emails found on `url`, returning how many were new.
    ///
    /// An email already present (in any letter case) is dropped. `phone` is
    /// kept only if `url` has no phone yet.
    pub fn record(&self, url: &str, emails: &[String], phone: Option<&str>) -> usize {
        self.record_with_listing(url, None, emails, phone)
    }

    /// Like [`record`](Self::record), also noting the listing that led to `url`.
    pub fn record_with_listing(
        &self,
        url: &str,
        listing_url: Option<&str>,
        emails: &[String],
        phone: Option<&str>,
    ) -> usize {
        let mut inner = self.lock();
        let mut added = 0;

        for email in emails {
            let email = email.trim();
            if email.is_empty() {
                continue;
            }
            let key = canonical_email(email);
            if inner.records.contains_key(&key) {
                continue;
            }
            inner.records.insert(
                key,
                Entry {
                    company: company_name_for(url, email),
                    email: email.to_string(),
                    source_url: url.to_string(),
                    listing_url: listing_url.map(str::to_string),
                },
            );
            tracing::info!(url, "Recorded {}", email);
            added += 1;
        }

        if let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) {
            inner
                .phones
                .entry(url.to_string())
                .or_insert_with(|| phone.to_string());
        }

        added
    }

    /// Whether `url` has been processed in this or a resumed run.
    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    /// Mark `url` visited. Returns `false` if it already was.
    ///
    /// Callers use the return value to claim a URL before working on it.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.lock().visited.insert(url.to_string())
    }

    /// Number of visited URLs.
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// All records, sorted by company then email (case-insensitive).
    pub fn snapshot(&self) -> Vec<ContactRecord> {
        self.lock().sorted_records()
    }

    /// Write every record to the persisted file, atomically.
    ///
    /// The lock is held for the whole write so concurrent flushes never
    /// share the temporary file.
    pub fn flush(&self) -> Result<()> {
        let inner = self.lock();
        let records = inner.sorted_records();

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.tmp_path();
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(HEADER)?;
        for record in &records {
            writer.write_record([
                record.company.as_str(),
                record.email.as_str(),
                record.phone.as_deref().unwrap_or_default(),
                record.source_url.as_str(),
            ])?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, &self.path)?;
        tracing::debug!(records = records.len(), "Saved {}", self.path.display());
        Ok(())
    }

    /// Forget every record and visited URL and delete the persisted file.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.records.clear();
        inner.phones.clear();
        inner.visited.clear();

        for path in [self.path.clone(), self.tmp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tracing::info!("Cleared store {}", self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
