//! The extraction pipeline: page, best match, selector, siblings, model, records.

use crate::browser::{BrowserDriver, BrowserSession, Page};
use crate::dom::{CssSelector, synthesize};
use crate::error::{Result, ScrapeError};
use crate::llm::{ChatGuard, DEFAULT_SYSTEM_PROMPT, GenerationOptions, LanguageModel};
use crate::matching::find_best_match;
use crate::record::ExtractedRecord;
use crate::semantic::SemanticEngine;
use crate::text::normalize;
use futures::Stream;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::time::Instant;

/// Scrapes pages with injected browser, semantic engine and language model.
///
/// At most one extraction runs per scraper: [`Scraper::extract`] borrows the
/// scraper mutably for as long as its [`Extraction`] lives.
pub struct Scraper {
    driver: Box<dyn BrowserDriver>,
    engine: Box<dyn SemanticEngine>,
    model: Box<dyn LanguageModel>,
    system_prompt: String,
    generation: GenerationOptions,
    session: Option<Box<dyn BrowserSession>>,
    page: Option<Box<dyn Page>>,
}

impl Scraper {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        engine: Box<dyn SemanticEngine>,
        model: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            driver,
            engine,
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            generation: GenerationOptions::default(),
            session: None,
            page: None,
        }
    }

    /// Builder method: set the instruction every chat session starts with
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Builder method: set sampling parameters
    pub fn with_generation_options(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    /// Load `url`, find the region that best matches `query`, and prepare one
    /// model call per sibling element of that region.
    ///
    /// Navigation and DOM errors are returned here; nothing has been sent to
    /// the model yet. Records are produced lazily by the returned [`Extraction`].
    pub async fn extract(&mut self, url: &str, query: &str) -> Result<Extraction<'_>> {
        self.release_browser().await?;

        log::debug!("Starting browser");
        let session = self.session.insert(self.driver.start().await?);

        log::debug!("Navigating to {}", url);
        let page = self.page.insert(session.navigate(url).await?);
        log::debug!("Navigated to {}", url);

        let body = page
            .query_selector("body")
            .await?
            .ok_or_else(|| ScrapeError::ElementNotFound(format!("<body> of {}", url)))?;

        let query_embedding = self.engine.embed(query).await?;

        log::debug!("Finding best matching element based on text input");
        let started = Instant::now();
        let best = find_best_match(self.engine.as_ref(), &body, &query_embedding).await?;
        log::info!(
            "Found best match <{}> (score {:.3}, {} nodes), took {:.2}s",
            best.element.tag_name,
            best.score,
            best.visited,
            started.elapsed().as_secs_f64()
        );

        let selector = synthesize(&best.element);
        drop(best);
        drop(body);

        let elements = page.query_selector_all(&selector.as_css()).await?;
        let texts: VecDeque<(usize, String)> = elements
            .iter()
            .map(|element| normalize(&element.flattened_text()))
            .enumerate()
            .collect();
        log::info!("Found {} elements matching '{}'", texts.len(), selector);

        let chat = if texts.is_empty() {
            None
        } else {
            Some(ChatGuard::new(self.model.open_chat_session(&self.system_prompt).await?))
        };

        Ok(Extraction {
            selector,
            pending: texts,
            chat,
            generation: self.generation,
            _scraper: PhantomData,
        })
    }

    /// Close the page and stop the browser left over from the last extraction
    pub async fn release_browser(&mut self) -> Result<()> {
        if let Some(mut page) = self.page.take() {
            if !page.is_closed() {
                log::debug!("Closing page {}", page.url());
                page.close().await?;
            }
        }

        if let Some(mut session) = self.session.take() {
            if !session.is_stopped() {
                log::debug!("Stopping browser session");
                session.stop().await?;
            }
        }

        Ok(())
    }

    /// Release the browser and the language model. Calling it again is a no-op.
    pub async fn quit(&mut self) -> Result<()> {
        self.release_browser().await?;
        self.model.close();
        Ok(())
    }
}

/// Records still to be produced by one extraction.
///
/// Each call to [`Extraction::next`] sends one element's text to the model.
/// A malformed response yields a per-record error and the extraction
/// continues; a failed model call yields its error and ends the extraction.
/// The chat session is closed once the extraction is exhausted or dropped.
pub struct Extraction<'a> {
    selector: CssSelector,
    pending: VecDeque<(usize, String)>,
    chat: Option<ChatGuard>,
    generation: GenerationOptions,
    _scraper: PhantomData<&'a mut Scraper>,
}

/// Everything an extraction produced when driven to completion
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Records produced before the extraction ended
    pub records: Vec<ExtractedRecord>,
    /// Per-record failures, in element order
    pub malformed: Vec<ScrapeError>,
    /// The error that ended the extraction early, if any
    pub fatal: Option<ScrapeError>,
}

impl ExtractionReport {
    /// Whether every element was sent to the model
    pub fn is_complete(&self) -> bool {
        self.fatal.is_none()
    }
}

impl<'a> Extraction<'a> {
    /// Selector the sibling elements were collected with
    pub fn selector(&self) -> &CssSelector {
        &self.selector
    }

    /// Number of elements not yet sent to the model
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Produce the next record, or `None` once every element has been processed
    pub async fn next(&mut self) -> Option<Result<ExtractedRecord>> {
        let (index, text) = self.pending.pop_front()?;
        let chat = self.chat.as_mut()?;

        let started = Instant::now();
        let response = match chat.generate(&text, &self.generation).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Generation failed for element {}: {}", index, e);
                self.finish();
                return Some(Err(e));
            }
        };
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = ExtractedRecord::from_response(&response)
            .map_err(|reason| ScrapeError::MalformedModelOutput { index, reason });

        match &outcome {
            Ok(record) => log::info!("{} # took {:.2}s", record.to_json(), elapsed),
            Err(e) => log::warn!("Skipping element {}: {} # took {:.2}s", index, e, elapsed),
        }

        if self.pending.is_empty() {
            self.finish();
        }

        Some(outcome)
    }

    /// Drive the extraction to the end, collecting records and failures.
    ///
    /// Records produced before a fatal error are kept in the report.
    pub async fn run(mut self) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        while let Some(outcome) = self.next().await {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(e) if e.is_per_record() => report.malformed.push(e),
                Err(e) => report.fatal = Some(e),
            }
        }

        report
    }

    /// Adapt into a [`Stream`] of per-record outcomes
    pub fn into_stream(self) -> impl Stream<Item = Result<ExtractedRecord>> + 'a {
        futures::stream::unfold(self, |mut extraction| async move {
            let outcome = extraction.next().await?;
            Some((outcome, extraction))
        })
    }

    fn finish(&mut self) {
        self.pending.clear();
        if let Some(mut chat) = self.chat.take() {
            chat.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::StaticDriver;
    use crate::llm::ChatSession;
    use crate::semantic::HashingEngine;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Shared log of what the scripted model saw
    #[derive(Default)]
    struct Transcript {
        system_prompts: Vec<String>,
        prompts: Vec<String>,
        closed_sessions: usize,
    }

    struct ScriptedModel {
        replies: Vec<String>,
        transcript: Arc<Mutex<Transcript>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> (Self, Arc<Mutex<Transcript>>) {
            let transcript = Arc::new(Mutex::new(Transcript::default()));
            let model = Self {
                replies: replies.iter().map(|r| r.to_string()).collect(),
                transcript: transcript.clone(),
            };
            (model, transcript)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn open_chat_session(&self, system_prompt: &str) -> Result<Box<dyn ChatSession>> {
            self.transcript
                .lock()
                .unwrap()
                .system_prompts
                .push(system_prompt.to_string());
            Ok(Box::new(ScriptedChat {
                replies: self.replies.clone().into(),
                transcript: self.transcript.clone(),
                closed: false,
            }))
        }
    }

    struct ScriptedChat {
        replies: VecDeque<String>,
        transcript: Arc<Mutex<Transcript>>,
        closed: bool,
    }

    #[async_trait]
    impl ChatSession for ScriptedChat {
        async fn generate(&mut self, prompt: &str, options: &GenerationOptions) -> Result<String> {
            assert_eq!(options.max_tokens, 256);
            self.transcript.lock().unwrap().prompts.push(prompt.to_string());
            self.replies
                .pop_front()
                .ok_or_else(|| ScrapeError::Generation("script exhausted".to_string()))
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.transcript.lock().unwrap().closed_sessions += 1;
            }
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    const URL: &str = "https://shop.test/list";

    const LISTING: &str = "<html><body><h1>Welcome</h1><ul>\
        <li>Red apple 1.20 each</li>\
        <li>Green pear 0.90 each</li>\
        <li>Yellow banana 0.30 each</li>\
        </ul><footer>Contact us</footer></body></html>";

    fn scraper(replies: &[&str]) -> (Scraper, Arc<Mutex<Transcript>>) {
        let (model, transcript) = ScriptedModel::new(replies);
        let scraper = Scraper::new(
            Box::new(StaticDriver::fixed([(URL, LISTING)])),
            Box::new(HashingEngine::default()),
            Box::new(model),
        );
        (scraper, transcript)
    }

    #[tokio::test]
    async fn test_extracts_every_sibling_in_order() {
        let (mut scraper, transcript) = scraper(&[
            "```json\n{\"name\": \"Red apple\", \"price\": \"1.20\"}\n```",
            "```json\n{\"name\": \"Green pear\", \"price\": \"0.90\"}\n```",
            "```json\n{\"name\": \"Yellow banana\", \"price\": \"0.30\"}\n```",
        ]);

        let extraction = scraper.extract(URL, "green pear each").await.unwrap();
        assert_eq!(extraction.selector().as_css(), "html body ul li");
        assert_eq!(extraction.remaining(), 3);

        let report = extraction.run().await;
        assert!(report.is_complete());
        let names: Vec<_> = report.records.iter().map(|r| r.get("name").unwrap()).collect();
        assert_eq!(names, vec!["Red apple", "Green pear", "Yellow banana"]);
        assert!(report.malformed.is_empty());

        let transcript = transcript.lock().unwrap();
        assert_eq!(transcript.system_prompts, vec![DEFAULT_SYSTEM_PROMPT.to_string()]);
        assert_eq!(transcript.prompts[1], "Green pear 0.90 each");
        assert_eq!(transcript.closed_sessions, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_ends_extraction() {
        let (mut scraper, transcript) = scraper(&["```{\"name\": \"Red apple\"}```"]);

        let mut extraction = scraper.extract(URL, "red apple each").await.unwrap();
        assert!(extraction.next().await.unwrap().is_ok());
        assert!(matches!(extraction.next().await, Some(Err(ScrapeError::Generation(_)))));
        assert!(extraction.next().await.is_none());
        assert_eq!(extraction.remaining(), 0);

        assert_eq!(transcript.lock().unwrap().closed_sessions, 1);
    }

    #[tokio::test]
    async fn test_run_keeps_records_before_generation_failure() {
        let (mut scraper, transcript) = scraper(&["```json\n{\"name\": \"Red apple\"}\n```"]);

        let report = scraper.extract(URL, "red apple each").await.unwrap().run().await;
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].get("name"), Some("Red apple"));
        assert!(report.malformed.is_empty());
        assert!(matches!(report.fatal, Some(ScrapeError::Generation(_))));
        assert!(!report.is_complete());

        let transcript = transcript.lock().unwrap();
        assert_eq!(transcript.prompts.len(), 2);
        assert_eq!(transcript.closed_sessions, 1);
    }

    #[tokio::test]
    async fn test_dropping_extraction_closes_chat() {
        let (mut scraper, transcript) = scraper(&["```{}```", "```{}```", "```{}```"]);

        {
            let mut extraction = scraper.extract(URL, "pear each").await.unwrap();
            extraction.next().await.unwrap().unwrap();
        }

        assert_eq!(transcript.lock().unwrap().closed_sessions, 1);
        scraper.quit().await.unwrap();
        scraper.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_yields_outcomes() {
        use futures::StreamExt;

        let (mut scraper, _) = scraper(&["```{\"a\": \"1\"}```", "no fences", "```{\"a\": \"3\"}```"]);
        let extraction = scraper.extract(URL, "banana each").await.unwrap();

        let outcomes: Vec<_> = extraction.into_stream().collect().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(ScrapeError::MalformedModelOutput { index: 1, .. })));
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_fatal() {
        let (mut scraper, transcript) = scraper(&[]);

        let err = scraper.extract("https://shop.test/missing", "anything").await.err().unwrap();
        assert!(matches!(err, ScrapeError::NavigationFailed { ref url, .. } if url == "https://shop.test/missing"));
        assert!(transcript.lock().unwrap().system_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_custom_prompt_and_options() {
        let (model, transcript) = ScriptedModel::new(&["```{}```", "```{}```", "```{}```"]);
        let mut scraper = Scraper::new(
            Box::new(StaticDriver::fixed([(URL, LISTING)])),
            Box::new(HashingEngine::default()),
            Box::new(model),
        )
        .with_system_prompt("Answer in fenced JSON.")
        .with_generation_options(GenerationOptions {
            max_tokens: 256,
            temperature: 0.5,
        });

        let report = scraper.extract(URL, "apple").await.unwrap().run().await;
        assert_eq!(report.records.len(), 3);
        assert!(report.records.iter().all(ExtractedRecord::is_empty));
        assert_eq!(
            transcript.lock().unwrap().system_prompts,
            vec!["Answer in fenced JSON.".to_string()]
        );
    }
}
