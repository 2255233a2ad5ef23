//! Page-range parser: physical page → printed page numbers.
//!
//! ```text
//! pages ──▶ size groups ──┬─ ≤ small_group_max_pages ─▶ one call reads every page
//!                         └─ larger ─▶ sample ▶ classify ▶ apply pattern
//!                                        ▲ retry on Partial/Inconsistent
//!       ──▶ merge ──▶ postprocess ──▶ PageRangeOutput
//! ```
//!
//! Groups run concurrently (bounded by `concurrency`); sampling inside a
//! group is sequential. Post-processing runs once, after every group.

use crate::config::PageRangeConfig;
use crate::document::{Document, PageItem};
use crate::error::{DocStructError, PageRangeParseError};
use crate::output::{GroupReport, LlmUsage, PagePattern, PageRange, PageRangeMap, PageRangeOutput};
use crate::page_range::grouping::{group_pages, PageGroup};
use crate::page_range::pattern::{apply_pattern, classify, parse_readings, sample_indices, SampleOutcome};
use crate::page_range::postprocess::{postprocess, PostprocessOptions};
use crate::pipeline::input::ImageLoader;
use crate::pipeline::llm::LlmVisionCaller;
use crate::prompts::{
    page_number_prompt, page_number_schema, PAGE_NUMBER_SYSTEM_PROMPT, PAGE_RANGE_COMPONENT,
    PHASE_PATTERN_SAMPLING, PHASE_SMALL_GROUP,
};
use crate::vision::{VisionCaller, VisionRequest};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reads printed page numbers through a [`VisionCaller`].
pub struct PageRangeParser {
    config: PageRangeConfig,
    caller: Arc<dyn VisionCaller>,
}

/// Everything one size group contributes to the output.
struct GroupResult {
    ranges: Vec<(u32, PageRange)>,
    usage: Vec<LlmUsage>,
    report: GroupReport,
}

impl PageRangeParser {
    pub fn new(config: PageRangeConfig, caller: Arc<dyn VisionCaller>) -> Self {
        Self { config, caller }
    }

    /// Parser backed by an [`LlmVisionCaller`] resolved from `config`.
    pub fn from_config(config: PageRangeConfig) -> Result<Self, DocStructError> {
        let caller = LlmVisionCaller::from_config(&config)?;
        Ok(Self::new(config, Arc::new(caller)))
    }

    pub fn config(&self) -> &PageRangeConfig {
        &self.config
    }

    /// Map every physical page of `document` to its printed page range.
    ///
    /// # Errors
    /// [`PageRangeParseError`] when a large group never yields a consistent
    /// pattern, a page image cannot be loaded, or a vision call fails or is
    /// cancelled. The first failing group aborts the others.
    pub async fn parse(&self, document: &Document) -> Result<PageRangeOutput, PageRangeParseError> {
        let groups = group_pages(document, self.config.size_tolerance);
        if groups.is_empty() {
            info!("Document has no pages; nothing to parse");
            return Ok(PageRangeOutput {
                page_range_map: PageRangeMap::new(),
                usage: vec![LlmUsage::zero(PAGE_RANGE_COMPONENT, PHASE_PATTERN_SAMPLING)],
                groups: Vec::new(),
            });
        }

        let total_pages: usize = groups.iter().map(PageGroup::len).sum();
        info!(
            "Parsing page ranges: {} pages in {} size group(s)",
            total_pages,
            groups.len()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_parse_start(total_pages, groups.len());
        }

        let loader = ImageLoader::new(
            document.base_dir.clone(),
            self.config.download_timeout_secs,
            self.config.max_image_dimension,
        )
        .map_err(|source| PageRangeParseError::ImageLoad { page: 0, source })?;

        let mut results: Vec<GroupResult> = stream::iter(groups.iter().map(|g| self.process_group(g, &loader)))
            .buffer_unordered(self.config.concurrency.max(1))
            .try_collect()
            .await?;
        results.sort_by_key(|r| r.report.first_page);

        let mut merged = PageRangeMap::new();
        let mut usage = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for result in results {
            merged.extend(result.ranges);
            usage.extend(result.usage);
            reports.push(result.report);
        }

        let options = PostprocessOptions {
            outlier_threshold: self.config.outlier_threshold,
            min_backfill_context: self.config.min_backfill_context,
        };
        let page_range_map = postprocess(merged, &options);

        let output = PageRangeOutput {
            page_range_map,
            usage,
            groups: reports,
        };
        let failed = output.failed_pages().len();
        info!(
            "Page ranges parsed: {} pages, {} unresolved, {} vision call(s)",
            output.total_pages(),
            failed,
            output.usage.len()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_parse_complete(output.total_pages(), failed);
        }
        Ok(output)
    }

    async fn process_group(
        &self,
        group: &PageGroup<'_>,
        loader: &ImageLoader,
    ) -> Result<GroupResult, PageRangeParseError> {
        let (first, last) = (group.first_page(), group.last_page());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_group_start(first, last);
        }

        let result = if group.len() <= self.config.small_group_max_pages {
            self.read_small_group(group, loader).await
        } else {
            self.detect_group_pattern(group, loader).await
        };

        if let Some(ref cb) = self.config.progress_callback {
            match &result {
                Ok(r) => cb.on_group_complete(first, last, r.usage.len() as u32),
                Err(e) => cb.on_group_error(first, last, &e.to_string()),
            }
        }
        result
    }

    /// One call for the whole group; unreadable pages get the sentinel.
    async fn read_small_group(
        &self,
        group: &PageGroup<'_>,
        loader: &ImageLoader,
    ) -> Result<GroupResult, PageRangeParseError> {
        debug!(
            "Pages {}-{}: reading {} page(s) directly",
            group.first_page(),
            group.last_page(),
            group.len()
        );
        let (readings, usage) = self.read_pages(&group.pages, loader, PHASE_SMALL_GROUP).await?;
        let ranges = group
            .pages
            .iter()
            .zip(readings)
            .map(|(page, reading)| (page.page_no, reading.unwrap_or(PageRange::FAILED)))
            .collect();

        Ok(GroupResult {
            ranges,
            usage: vec![usage],
            report: GroupReport {
                first_page: group.first_page(),
                last_page: group.last_page(),
                pattern: None,
                attempts: 1,
            },
        })
    }

    /// Sample, classify, retry. Exhausted retries fail when any attempt was
    /// inconsistent and fall back to `Unknown` when they were only partial.
    async fn detect_group_pattern(
        &self,
        group: &PageGroup<'_>,
        loader: &ImageLoader,
    ) -> Result<GroupResult, PageRangeParseError> {
        let (first, last) = (group.first_page(), group.last_page());
        let mut usage = Vec::new();
        let mut inconsistency: Option<String> = None;
        let mut pattern = None;
        let mut attempts = 0;

        for attempt in 0..self.config.pattern_retries {
            attempts = attempt + 1;
            let sampled: Vec<&PageItem> = sample_indices(group.len(), self.config.sample_size, attempt)
                .into_iter()
                .map(|i| group.pages[i])
                .collect();

            let (readings, call_usage) = self
                .read_pages(&sampled, loader, PHASE_PATTERN_SAMPLING)
                .await?;
            usage.push(call_usage);

            let samples: Vec<(u32, Option<PageRange>)> =
                sampled.iter().map(|p| p.page_no).zip(readings).collect();
            match classify(&samples, self.config.offset_tolerance) {
                SampleOutcome::Complete(found) => {
                    info!(
                        "Pages {}-{}: {:?} after {} attempt(s)",
                        first, last, found, attempts
                    );
                    pattern = Some(found);
                    break;
                }
                SampleOutcome::Partial => {
                    debug!("Pages {}-{}: attempt {} partially unreadable", first, last, attempts);
                }
                SampleOutcome::Inconsistent(detail) => {
                    warn!(
                        "Pages {}-{}: attempt {} inconsistent ({})",
                        first, last, attempts, detail
                    );
                    inconsistency = Some(detail);
                }
            }
        }

        let pattern = match (pattern, inconsistency) {
            (Some(p), _) => p,
            (None, Some(detail)) => {
                return Err(PageRangeParseError::PatternNotDetected {
                    first_page: first,
                    last_page: last,
                    attempts,
                    detail,
                })
            }
            (None, None) => {
                warn!(
                    "Pages {}-{}: no readable pattern after {} attempt(s); marking unknown",
                    first, last, attempts
                );
                PagePattern::Unknown
            }
        };

        let ranges = group
            .pages
            .iter()
            .map(|p| (p.page_no, apply_pattern(pattern, p.page_no)))
            .collect();
        Ok(GroupResult {
            ranges,
            usage,
            report: GroupReport {
                first_page: first,
                last_page: last,
                pattern: Some(pattern),
                attempts,
            },
        })
    }

    /// Load the images of `pages` and ask the model for their numbers.
    async fn read_pages(
        &self,
        pages: &[&PageItem],
        loader: &ImageLoader,
        phase: &str,
    ) -> Result<(Vec<Option<PageRange>>, LlmUsage), PageRangeParseError> {
        let mut images = Vec::with_capacity(pages.len());
        for page in pages {
            let image = loader
                .load(page)
                .await
                .map_err(|source| PageRangeParseError::ImageLoad {
                    page: page.page_no,
                    source,
                })?;
            images.push(image);
        }

        if self
            .config
            .abort
            .as_ref()
            .is_some_and(|signal| signal.is_aborted())
        {
            return Err(PageRangeParseError::Cancelled);
        }

        let request = VisionRequest {
            schema: page_number_schema(),
            system_prompt: PAGE_NUMBER_SYSTEM_PROMPT.to_string(),
            prompt: page_number_prompt(pages.len()),
            images,
            primary_model: self.config.primary_model().to_string(),
            fallback_model: self.config.fallback_model.clone(),
            max_retries: self.config.max_retries,
            abort: self.config.abort.clone(),
            component: PAGE_RANGE_COMPONENT.to_string(),
            phase: phase.to_string(),
        };
        let response = self.caller.call(request).await?;
        Ok((parse_readings(&response.output, pages.len()), response.usage))
    }
}
