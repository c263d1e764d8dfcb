use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use crate::adapter::AdapterRegistry;
use crate::database::{prepare_images, Database};
use crate::dedupe;
use crate::http_client;
use crate::models::{NormalizeOutcome, PipelineRunResult, Property, University};
use crate::normalize;
use crate::validate;

/// Concurrent in-flight image checks. The cap keeps a big catalog from
/// opening hundreds of sockets at once.
const IMAGE_CHECK_CONCURRENCY: usize = 8;

pub struct ImportOptions {
    /// Force a specific adapter instead of sniffing the input.
    pub source: Option<String>,
    pub check_images: bool,
    pub image_check_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            source: None,
            check_images: false,
            image_check_timeout_secs: 5,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        }
    }
}

/// One full pipeline run over a single input file: extract, normalize,
/// validate, dedupe against both the batch and the stored catalog, then
/// write. Record-level problems are counted and never abort the run; only
/// setup failures (unreadable input, no matching adapter) return Err.
pub async fn run_import(
    db: &Database,
    registry: &AdapterRegistry,
    input_path: &str,
    options: &ImportOptions,
    cancelled: &AtomicBool,
) -> Result<PipelineRunResult> {
    let input = fs::read_to_string(input_path)
        .with_context(|| format!("failed to read input file '{}'", input_path))?;

    let adapter = match &options.source {
        Some(name) => registry
            .find(name)
            .with_context(|| format!("unknown source '{}'", name))?,
        None => registry
            .detect(&input)
            .context("no adapter recognizes the input file")?,
    };
    tracing::info!("Importing '{}' as {}", input_path, adapter.name());

    let raws = adapter.extract(&input)?;
    let context = adapter.context();

    let mut result = PipelineRunResult::default();
    result.extracted = raws.len();

    let mut ready = Vec::new();
    for raw in &raws {
        let property = match normalize::normalize(raw, &context) {
            NormalizeOutcome::Ready(property) => property,
            NormalizeOutcome::Skipped(reason) => {
                tracing::debug!("Skipping record: {}", reason);
                result.skipped += 1;
                continue;
            }
        };

        if let Some(reason) = validate::rejection_reason(&property) {
            tracing::debug!("Rejecting '{}': {}", property.title, reason);
            result.skipped += 1;
            continue;
        }

        ready.push(property);
    }

    let universities = dedupe::dedupe_universities(
        ready
            .iter()
            .filter_map(|p| {
                p.university.as_ref().map(|name| University {
                    name: name.clone(),
                    location: p.location.clone(),
                    source_url: None,
                })
            })
            .collect(),
    );

    let mut seen = db.existing_keys()?;
    let (mut unique, duplicates) = dedupe::dedupe(ready, &mut seen);
    result.duplicates_removed = duplicates;

    if options.check_images {
        let client =
            http_client::create_http_client(&options.user_agent, options.image_check_timeout_secs)?;
        drop_unreachable_images(&mut unique, &client).await;
    }

    let mut university_ids: HashMap<String, i64> = HashMap::new();
    for university in &universities {
        match db.insert_or_get_university(university) {
            Ok(id) => {
                university_ids.insert(university.name.trim().to_lowercase(), id);
            }
            Err(e) => {
                tracing::error!("Failed to store university '{}': {}", university.name, e);
                result.errors += 1;
            }
        }
    }

    for property in &unique {
        if cancelled.load(Ordering::SeqCst) {
            tracing::warn!(
                "Cancelled with {} of {} records written; re-run to finish",
                result.imported,
                unique.len()
            );
            break;
        }

        let university_id = property
            .university
            .as_ref()
            .and_then(|name| university_ids.get(&name.trim().to_lowercase()))
            .copied();

        let images = prepare_images(&property.images);
        match db.insert_property(property, university_id) {
            Ok(id) => {
                result.record_imported(property);
                result.errors += db.insert_images(&id, &images);
            }
            Err(e) => {
                tracing::error!("Failed to insert '{}': {}", property.title, e);
                result.errors += 1;
            }
        }
    }

    tracing::info!(
        "Import finished: {} extracted, {} imported, {} skipped, {} duplicates, {} errors",
        result.extracted,
        result.imported,
        result.skipped,
        result.duplicates_removed,
        result.errors
    );
    Ok(result)
}

/// Wipe the catalog, then import. The old catalog is superseded wholesale.
pub async fn run_clean_import(
    db: &Database,
    registry: &AdapterRegistry,
    input_path: &str,
    options: &ImportOptions,
    cancelled: &AtomicBool,
) -> Result<PipelineRunResult> {
    db.wipe()?;
    run_import(db, registry, input_path, options, cancelled).await
}

/// HEAD-check every image URL with bounded concurrency and drop the ones
/// that do not answer. The record itself always survives.
async fn drop_unreachable_images(properties: &mut [Property], client: &reqwest::Client) {
    let mut jobs = properties
        .iter()
        .enumerate()
        .flat_map(|(pi, property)| {
            property
                .images
                .iter()
                .enumerate()
                .map(move |(ii, image)| (pi, ii, image.url.clone()))
        })
        .collect::<Vec<_>>()
        .into_iter();

    let mut tasks = JoinSet::new();
    let mut spawn_next = |tasks: &mut JoinSet<(usize, usize, bool)>| {
        if let Some((pi, ii, url)) = jobs.next() {
            let client = client.clone();
            tasks.spawn(async move {
                let reachable = http_client::url_is_reachable(&client, &url).await;
                (pi, ii, reachable)
            });
        }
    };

    for _ in 0..IMAGE_CHECK_CONCURRENCY {
        spawn_next(&mut tasks);
    }

    let mut unreachable: HashSet<(usize, usize)> = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok((pi, ii, reachable)) = joined {
            if !reachable {
                unreachable.insert((pi, ii));
            }
        }
        spawn_next(&mut tasks);
    }

    if unreachable.is_empty() {
        return;
    }
    tracing::info!("Dropping {} unreachable images", unreachable.len());

    for (pi, property) in properties.iter_mut().enumerate() {
        let mut index = 0;
        property.images.retain(|_| {
            let keep = !unreachable.contains(&(pi, index));
            index += 1;
            keep
        });
    }
}
