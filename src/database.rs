use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::cities;
use crate::models::{Property, PropertyImage, University};
use crate::validate;

/// Images kept per property after filtering.
pub const MAX_IMAGES_PER_PROPERTY: usize = 20;

/// Aggregate catalog figures for the stats report.
#[derive(Debug)]
pub struct CatalogStats {
    pub properties: i64,
    pub images: i64,
    pub universities: i64,
    pub by_location: Vec<(String, i64)>,
    pub price_min: Option<f64>,
    pub price_avg: Option<f64>,
    pub price_max: Option<f64>,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init()?;
        Ok(db)
    }

    /// In-memory catalog, used by the test suites.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // Image rows must go when their property goes
        self.conn.execute_batch("PRAGMA foreign_keys = ON")?;
        self.init_schema()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS universities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                source_url TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price REAL NOT NULL,
                price_type TEXT NOT NULL DEFAULT 'weekly',
                location TEXT NOT NULL,
                postcode TEXT,
                full_address TEXT,
                bedrooms INTEGER NOT NULL DEFAULT 1,
                bathrooms INTEGER NOT NULL DEFAULT 1,
                property_type TEXT NOT NULL DEFAULT 'flat',
                furnished INTEGER NOT NULL DEFAULT 1,
                available INTEGER NOT NULL DEFAULT 1,
                description TEXT,
                landlord_name TEXT,
                features TEXT NOT NULL DEFAULT '[]',
                source TEXT NOT NULL,
                source_url TEXT,
                university_id INTEGER REFERENCES universities(id),
                scraped_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS property_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                property_id TEXT NOT NULL REFERENCES properties(id) ON DELETE CASCADE,
                url TEXT NOT NULL,
                alt_text TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // Index the dedup key columns for the cross-run scan
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_properties_dedup
             ON properties(title, location, price)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_images_property
             ON property_images(property_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_universities_name ON universities(name)",
            [],
        )?;

        Ok(())
    }

    /// Insert a property row; the persistence id is assigned here.
    pub fn insert_property(
        &self,
        property: &Property,
        university_id: Option<i64>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn.execute(
            "INSERT INTO properties (
                id, title, price, price_type, location, postcode, full_address,
                bedrooms, bathrooms, property_type, furnished, available,
                description, landlord_name, features, source, source_url,
                university_id, scraped_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                id.to_string(),
                &property.title,
                property.price,
                property.price_type.as_str(),
                &property.location,
                &property.postcode,
                &property.full_address,
                property.bedrooms,
                property.bathrooms,
                &property.property_type,
                property.furnished,
                property.available,
                &property.description,
                &property.landlord_name,
                serde_json::to_string(&property.features)?,
                &property.source,
                &property.source_url,
                university_id,
                property.scraped_at,
                now,
                now,
            ],
        )?;

        Ok(id)
    }

    /// Insert a property's images, already filtered by `prepare_images`.
    /// A failed image insert is logged and counted but does not unwind the
    /// property row; returns the failure count.
    pub fn insert_images(&self, property_id: &Uuid, images: &[PropertyImage]) -> usize {
        let mut failures = 0;
        for image in images {
            let inserted = self.conn.execute(
                "INSERT INTO property_images (property_id, url, alt_text, is_primary, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    property_id.to_string(),
                    &image.url,
                    &image.alt_text,
                    image.is_primary,
                    image.position,
                ],
            );
            if let Err(e) = inserted {
                tracing::error!("Failed to insert image '{}': {}", image.url, e);
                failures += 1;
            }
        }
        failures
    }

    /// Find or create a university row, keyed on lower-cased name.
    pub fn insert_or_get_university(&self, university: &University) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM universities WHERE lower(name) = lower(?1)",
                params![university.name.trim()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO universities (name, location, source_url) VALUES (?1, ?2, ?3)",
            params![
                university.name.trim(),
                &university.location,
                &university.source_url,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Dedup keys of every stored property, so a fresh batch can be checked
    /// against the catalog with the exact same key function.
    pub fn existing_keys(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT title, location, price FROM properties")?;
        let keys = stmt
            .query_map([], |row| {
                let title: String = row.get(0)?;
                let location: String = row.get(1)?;
                let price: f64 = row.get(2)?;
                Ok(Property::key_of(&title, &location, price))
            })?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    /// Drop the whole catalog ahead of a clean import.
    pub fn wipe(&self) -> Result<()> {
        self.conn.execute("DELETE FROM property_images", [])?;
        self.conn.execute("DELETE FROM properties", [])?;
        self.conn.execute("DELETE FROM universities", [])?;
        tracing::info!("Catalog wiped for clean import");
        Ok(())
    }

    pub fn count_properties(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_images(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM property_images", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_universities(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM universities", [], |row| row.get(0))?;
        Ok(count)
    }

    #[cfg(test)]
    pub fn images_for(&self, property_id: &Uuid) -> Result<Vec<PropertyImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, alt_text, is_primary, position
             FROM property_images WHERE property_id = ?1 ORDER BY position",
        )?;
        let images = stmt
            .query_map(params![property_id.to_string()], |row| {
                Ok(PropertyImage {
                    url: row.get(0)?,
                    alt_text: row.get(1)?,
                    is_primary: row.get(2)?,
                    position: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    /// Re-apply the validator to stored rows and delete the failures.
    /// Images go with their property via the cascade. Idempotent.
    pub fn remove_invalid(&self) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, price, location, postcode FROM properties")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = 0;
        for (id, title, price, location, postcode) in rows {
            let valid = price > validate::MIN_PRICE
                && price <= validate::MAX_PRICE
                && !title.trim().is_empty()
                && (!(location.trim().is_empty()
                    || location.trim().eq_ignore_ascii_case("unknown"))
                    || postcode.is_some());
            if !valid {
                self.conn
                    .execute("DELETE FROM properties WHERE id = ?1", params![id])?;
                tracing::debug!("Removed invalid property '{}'", title);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} invalid properties from catalog", removed);
        }
        Ok(removed)
    }

    /// Re-apply the dedup key to stored rows, earliest created row wins.
    /// Idempotent.
    pub fn remove_duplicates(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, location, price FROM properties
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let mut removed = 0;
        for (id, title, location, price) in rows {
            if !seen.insert(Property::key_of(&title, &location, price)) {
                self.conn
                    .execute("DELETE FROM properties WHERE id = ?1", params![id])?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} duplicate properties from catalog", removed);
        }
        Ok(removed)
    }

    /// Rewrite locations to canonical city names where one can be found in
    /// the stored location or address text. Rows with no match are left
    /// alone. Idempotent.
    pub fn normalize_locations(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id, location, COALESCE(full_address, '') FROM properties",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rewritten = 0;
        for (id, location, full_address) in rows {
            let replacement = match cities::canonical(&location) {
                // known city, but possibly a non-canonical spelling
                Some(exact) => (exact != location).then(|| exact.to_string()),
                None => cities::find_in(&format!("{} {}", location, full_address))
                    .map(str::to_string),
            };

            if let Some(city) = replacement {
                self.conn.execute(
                    "UPDATE properties SET location = ?1, updated_at = ?2 WHERE id = ?3",
                    params![city, Utc::now(), id],
                )?;
                rewritten += 1;
            }
        }

        if rewritten > 0 {
            tracing::info!("Normalized location on {} properties", rewritten);
        }
        Ok(rewritten)
    }

    /// Upgrade stored image URLs: plain http becomes https and explicit
    /// default ports are stripped. Re-running on a clean catalog changes
    /// nothing.
    pub fn normalize_image_urls(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM property_images")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rewritten = 0;
        for (id, url) in rows {
            if let Some(clean) = clean_image_url(&url) {
                self.conn.execute(
                    "UPDATE property_images SET url = ?1 WHERE id = ?2",
                    params![clean, id],
                )?;
                rewritten += 1;
            }
        }

        if rewritten > 0 {
            tracing::info!("Normalized {} image URLs", rewritten);
        }
        Ok(rewritten)
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let mut stmt = self.conn.prepare(
            "SELECT location, COUNT(*) FROM properties
             GROUP BY location ORDER BY COUNT(*) DESC, location ASC",
        )?;
        let by_location = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let (price_min, price_avg, price_max) = self.conn.query_row(
            "SELECT MIN(price), AVG(price), MAX(price) FROM properties",
            [],
            |row| {
                Ok((
                    row.get::<_, Option<f64>>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            },
        )?;

        Ok(CatalogStats {
            properties: self.count_properties()?,
            images: self.count_images()?,
            universities: self.count_universities()?,
            by_location,
            price_min,
            price_avg,
            price_max,
        })
    }
}

/// Writer-side image filtering: placeholder and logo assets are dropped,
/// the list is capped, exactly one survivor ends up primary (the first,
/// unless an explicit flag survived filtering) and positions are
/// renumbered.
pub fn prepare_images(images: &[PropertyImage]) -> Vec<PropertyImage> {
    let mut kept: Vec<PropertyImage> = images
        .iter()
        .filter(|image| {
            let url = image.url.to_lowercase();
            !url.contains("placeholder") && !url.contains("logo")
        })
        .take(MAX_IMAGES_PER_PROPERTY)
        .cloned()
        .collect();

    let mut primary_seen = false;
    for image in &mut kept {
        if image.is_primary {
            if primary_seen {
                image.is_primary = false;
            } else {
                primary_seen = true;
            }
        }
    }
    if !primary_seen {
        if let Some(first) = kept.first_mut() {
            first.is_primary = true;
        }
    }

    for (position, image) in kept.iter_mut().enumerate() {
        image.position = position as u32;
    }
    kept
}

/// The cleaned form of a stored image URL, or None when it is already
/// clean.
pub fn clean_image_url(url: &str) -> Option<String> {
    let mut out = url.to_string();
    if let Some(rest) = out.strip_prefix("http://") {
        out = format!("https://{}", rest);
    }
    out = strip_default_port(&out);
    (out != url).then_some(out)
}

fn strip_default_port(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let host_start = scheme_end + 3;
    let host_end = url[host_start..]
        .find('/')
        .map(|i| host_start + i)
        .unwrap_or(url.len());
    let host = &url[host_start..host_end];

    match host.strip_suffix(":443").or_else(|| host.strip_suffix(":80")) {
        Some(bare) => format!("{}{}{}", &url[..host_start], bare, &url[host_end..]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceType;

    fn property(title: &str, location: &str, price: f64) -> Property {
        Property {
            title: title.to_string(),
            price,
            price_type: PriceType::Weekly,
            location: location.to_string(),
            postcode: None,
            full_address: None,
            bedrooms: 2,
            bathrooms: 1,
            property_type: "flat".to_string(),
            furnished: true,
            available: true,
            description: None,
            landlord_name: None,
            features: vec!["Bills included".to_string()],
            source: "test".to_string(),
            source_url: None,
            university: None,
            images: vec![],
            scraped_at: Utc::now(),
        }
    }

    fn image(url: &str) -> PropertyImage {
        PropertyImage {
            url: url.to_string(),
            alt_text: "Property image 1".to_string(),
            is_primary: false,
            position: 0,
        }
    }

    #[test]
    fn test_insert_and_count() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_property(&property("Studio", "Leeds", 150.0), None).unwrap();
        assert_eq!(db.count_properties().unwrap(), 1);

        let failures = db.insert_images(
            &id,
            &[image("https://a/1.jpg"), image("https://a/2.jpg")],
        );
        assert_eq!(failures, 0);
        assert_eq!(db.count_images().unwrap(), 2);
    }

    #[test]
    fn test_existing_keys_match_fresh_records() {
        let db = Database::open_in_memory().unwrap();
        let p = property("Studio Flat", "Leeds", 200.0);
        db.insert_property(&p, None).unwrap();

        let keys = db.existing_keys().unwrap();
        assert!(keys.contains(&p.dedup_key()));
    }

    #[test]
    fn test_insert_or_get_university_dedups_by_name() {
        let db = Database::open_in_memory().unwrap();
        let leeds = University {
            name: "University of Leeds".to_string(),
            location: "Leeds".to_string(),
            source_url: None,
        };
        let id1 = db.insert_or_get_university(&leeds).unwrap();

        let shouty = University {
            name: "UNIVERSITY OF LEEDS".to_string(),
            location: "Leeds".to_string(),
            source_url: None,
        };
        let id2 = db.insert_or_get_university(&shouty).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(db.count_universities().unwrap(), 1);
    }

    #[test]
    fn test_wipe_clears_everything() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_property(&property("Studio", "Leeds", 150.0), None).unwrap();
        db.insert_images(&id, &[image("https://a/1.jpg")]);
        db.wipe().unwrap();
        assert_eq!(db.count_properties().unwrap(), 0);
        assert_eq!(db.count_images().unwrap(), 0);
    }

    #[test]
    fn test_remove_invalid_applies_validator_bounds() {
        let db = Database::open_in_memory().unwrap();
        db.insert_property(&property("Good", "Leeds", 150.0), None).unwrap();
        db.insert_property(&property("Too dear", "Leeds", 50000.0), None).unwrap();

        let mut unknown = property("No anchor", "Unknown", 150.0);
        db.insert_property(&unknown, None).unwrap();

        unknown.title = "Anchored".to_string();
        unknown.postcode = Some("M13 9PL".to_string());
        db.insert_property(&unknown, None).unwrap();

        let removed = db.remove_invalid().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(db.count_properties().unwrap(), 2);

        // second pass is a no-op
        assert_eq!(db.remove_invalid().unwrap(), 0);
    }

    #[test]
    fn test_remove_invalid_cascades_to_images() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_property(&property("Too dear", "Leeds", 50000.0), None).unwrap();
        db.insert_images(&id, &[image("https://a/1.jpg")]);
        assert_eq!(db.count_images().unwrap(), 1);

        db.remove_invalid().unwrap();
        assert_eq!(db.count_images().unwrap(), 0);
    }

    #[test]
    fn test_remove_duplicates_keeps_earliest() {
        let db = Database::open_in_memory().unwrap();
        db.insert_property(&property("Studio Flat", "Leeds", 200.0), None).unwrap();
        db.insert_property(&property("studio flat", "LEEDS", 200.0), None).unwrap();
        db.insert_property(&property("Studio Flat", "Leeds", 210.0), None).unwrap();

        let removed = db.remove_duplicates().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.count_properties().unwrap(), 2);

        assert_eq!(db.remove_duplicates().unwrap(), 0);
    }

    #[test]
    fn test_normalize_locations_rewrites_from_address() {
        let db = Database::open_in_memory().unwrap();

        let mut p = property("Flat", "Fallowfield", 120.0);
        p.full_address = Some("12 Ladybarn Lane, Fallowfield, Manchester M14 6NH".to_string());
        db.insert_property(&p, None).unwrap();

        let untouched = property("Flat 2", "Somewhere Else", 120.0);
        db.insert_property(&untouched, None).unwrap();

        assert_eq!(db.normalize_locations().unwrap(), 1);

        let keys = db.existing_keys().unwrap();
        assert!(keys.contains(&Property::key_of("Flat", "Manchester", 120.0)));
        assert!(keys.contains(&Property::key_of("Flat 2", "Somewhere Else", 120.0)));

        // idempotent
        assert_eq!(db.normalize_locations().unwrap(), 0);
    }

    #[test]
    fn test_normalize_locations_fixes_spelling() {
        let db = Database::open_in_memory().unwrap();
        db.insert_property(&property("Flat", "manchester", 120.0), None).unwrap();

        assert_eq!(db.normalize_locations().unwrap(), 1);
        let keys = db.existing_keys().unwrap();
        assert!(keys.contains(&Property::key_of("Flat", "Manchester", 120.0)));
    }

    #[test]
    fn test_normalize_image_urls_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_property(&property("Flat", "Leeds", 120.0), None).unwrap();
        db.insert_images(
            &id,
            &[
                image("http://images.example.com/a.jpg"),
                image("https://images.example.com:443/b.jpg"),
                image("https://images.example.com/c.jpg"),
            ],
        );

        assert_eq!(db.normalize_image_urls().unwrap(), 2);
        assert_eq!(db.normalize_image_urls().unwrap(), 0);

        let images = db.images_for(&id).unwrap();
        assert!(images.iter().all(|i| i.url.starts_with("https://")));
        assert!(images.iter().all(|i| !i.url.contains(":443")));
    }

    #[test]
    fn test_stats() {
        let db = Database::open_in_memory().unwrap();
        db.insert_property(&property("A", "Leeds", 100.0), None).unwrap();
        db.insert_property(&property("B", "Leeds", 200.0), None).unwrap();
        db.insert_property(&property("C", "York", 300.0), None).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.properties, 3);
        assert_eq!(stats.by_location[0], ("Leeds".to_string(), 2));
        assert_eq!(stats.price_min, Some(100.0));
        assert_eq!(stats.price_max, Some(300.0));
        assert_eq!(stats.price_avg, Some(200.0));
    }

    #[test]
    fn test_prepare_images_filters_and_caps() {
        let mut images: Vec<PropertyImage> = (0..25)
            .map(|i| image(&format!("https://cdn.example.com/{}.jpg", i)))
            .collect();
        images.insert(0, image("https://cdn.example.com/placeholder.jpg"));
        images.insert(5, image("https://cdn.example.com/agency-logo.png"));

        let kept = prepare_images(&images);
        assert_eq!(kept.len(), MAX_IMAGES_PER_PROPERTY);
        assert!(kept.iter().all(|i| !i.url.contains("placeholder")));
        assert!(kept.iter().all(|i| !i.url.contains("logo")));
        assert!(kept[0].is_primary);
        assert_eq!(kept.iter().filter(|i| i.is_primary).count(), 1);
        assert_eq!(kept.last().unwrap().position, 19);
    }

    #[test]
    fn test_prepare_images_keeps_explicit_primary() {
        let mut a = image("https://cdn.example.com/a.jpg");
        let mut b = image("https://cdn.example.com/b.jpg");
        a.is_primary = false;
        b.is_primary = true;

        let kept = prepare_images(&[a, b]);
        assert!(!kept[0].is_primary);
        assert!(kept[1].is_primary);
    }

    #[test]
    fn test_clean_image_url() {
        assert_eq!(
            clean_image_url("http://images.example.com/a.jpg"),
            Some("https://images.example.com/a.jpg".to_string())
        );
        assert_eq!(
            clean_image_url("https://images.example.com:443/a.jpg"),
            Some("https://images.example.com/a.jpg".to_string())
        );
        assert_eq!(clean_image_url("https://images.example.com/a.jpg"), None);
    }
}
