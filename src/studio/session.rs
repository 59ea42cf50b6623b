//! The studio session: owned state for the generate, edit and compose tabs.
//!
//! Every user action has exactly one entry point here. Requests are split into
//! [`Studio::begin`] and [`Studio::complete`] so a caller can keep polling the
//! simulated progress while the HTTP call runs; [`Studio::submit`] chains both.
//!
//! Each tab carries an epoch. [`Studio::abandon`] bumps it, and a completion
//! holding an older [`Ticket`] is discarded, so a response that arrives after its
//! tab was torn down never writes into state.

use super::api::{HttpImageApi, ImageApi};
use super::download::ImageSaver;
use super::error::{Result, StudioError, ValidationError};
use super::notice::{Notice, NoticeBoard};
use super::pool::{IdGenerator, ImagePool};
use super::progress::{Clock, Overlay, ProgressSimulator, ProgressStage, ProgressState, SystemClock};
use super::request::{self, ImageRequest, TabForm};
use super::selection::SelectionSet;
use super::transfer::{self, HttpFetcher, SourceFetcher};
use super::types::{
    AspectRatio, ImageFile, ImageId, ImageKind, ImageRecord, OutputFormat, Resolution, Tab,
    png_data_uri,
};
use super::upload::validate_image_url;
use crate::config::StudioConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The pools a record can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Generated,
    Edited,
    Composed,
    /// Working images the edit tab can apply an edit to
    EditModels,
    /// Candidate images for composition
    ComposeSources,
}

impl PoolKind {
    pub const ALL: [PoolKind; 5] = [
        PoolKind::Generated,
        PoolKind::Edited,
        PoolKind::Composed,
        PoolKind::EditModels,
        PoolKind::ComposeSources,
    ];
}

/// Identifies one outstanding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    tab: Tab,
    epoch: u64,
    prompt: String,
    aspect_ratio: Option<AspectRatio>,
    source: Option<ImageId>,
}

impl Ticket {
    pub fn tab(&self) -> Tab {
        self.tab
    }
}

/// A validated request ready to be dispatched
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub request: ImageRequest,
}

#[derive(Debug)]
struct TabState {
    form: TabForm,
    in_flight: bool,
    epoch: u64,
    progress: ProgressSimulator,
    last_error: Option<String>,
}

impl TabState {
    fn new(config: &StudioConfig) -> Self {
        Self {
            form: config.defaults.form(),
            in_flight: false,
            epoch: 0,
            progress: ProgressSimulator::new(config.progress.clone()),
            last_error: None,
        }
    }
}

pub struct Studio {
    config: StudioConfig,
    api: Arc<dyn ImageApi>,
    fetcher: Arc<dyn SourceFetcher>,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    notices: NoticeBoard,

    generate: TabState,
    edit: TabState,
    compose: TabState,

    generated: ImagePool,
    edited: ImagePool,
    composed: ImagePool,
    edit_models: ImagePool,
    compose_sources: ImagePool,

    // Edit sources
    edit_selected: Option<ImageId>,
    edit_upload: Option<ImageFile>,
    edit_url: String,

    compose_selection: SelectionSet,
}

impl Studio {
    pub fn new(config: StudioConfig, api: Arc<dyn ImageApi>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            api,
            fetcher,
            clock: Arc::new(SystemClock),
            ids: IdGenerator::new(),
            notices: NoticeBoard::new(),
            generate: TabState::new(&config),
            edit: TabState::new(&config),
            compose: TabState::new(&config),
            generated: ImagePool::new(),
            edited: ImagePool::new(),
            composed: ImagePool::new(),
            edit_models: ImagePool::new(),
            compose_sources: ImagePool::new(),
            edit_selected: None,
            edit_upload: None,
            edit_url: String::new(),
            compose_selection: SelectionSet::new(config.compose.max_selection),
            config,
        }
    }

    /// Studio talking to the configured service over HTTP
    pub fn connect(config: StudioConfig) -> Result<Self> {
        let api = HttpImageApi::new(&config.api)?;
        let fetcher = HttpFetcher::new(Duration::from_secs(config.api.fetch_timeout_secs))?;
        Ok(Self::new(config, Arc::new(api), Arc::new(fetcher)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn ImageApi> {
        Arc::clone(&self.api)
    }

    // ---- Form fields -------------------------------------------------------

    pub fn form(&self, tab: Tab) -> &TabForm {
        &self.tab(tab).form
    }

    pub fn set_prompt(&mut self, tab: Tab, prompt: impl Into<String>) {
        self.tab_mut(tab).form.prompt = prompt.into();
    }

    pub fn set_aspect_ratio(&mut self, tab: Tab, aspect_ratio: AspectRatio) {
        self.tab_mut(tab).form.aspect_ratio = aspect_ratio;
    }

    pub fn set_resolution(&mut self, tab: Tab, resolution: Resolution) {
        self.tab_mut(tab).form.resolution = resolution;
    }

    pub fn set_format(&mut self, tab: Tab, format: OutputFormat) {
        self.tab_mut(tab).form.format = format;
    }

    pub fn is_in_flight(&self, tab: Tab) -> bool {
        self.tab(tab).in_flight
    }

    /// Inline error text for the tab, cleared when the next request starts
    pub fn last_error(&self, tab: Tab) -> Option<&str> {
        self.tab(tab).last_error.as_deref()
    }

    // ---- Pools and selections ---------------------------------------------

    pub fn pool(&self, kind: PoolKind) -> &ImagePool {
        match kind {
            PoolKind::Generated => &self.generated,
            PoolKind::Edited => &self.edited,
            PoolKind::Composed => &self.composed,
            PoolKind::EditModels => &self.edit_models,
            PoolKind::ComposeSources => &self.compose_sources,
        }
    }

    fn pool_mut(&mut self, kind: PoolKind) -> &mut ImagePool {
        match kind {
            PoolKind::Generated => &mut self.generated,
            PoolKind::Edited => &mut self.edited,
            PoolKind::Composed => &mut self.composed,
            PoolKind::EditModels => &mut self.edit_models,
            PoolKind::ComposeSources => &mut self.compose_sources,
        }
    }

    pub fn find(&self, id: ImageId) -> Option<(PoolKind, &ImageRecord)> {
        PoolKind::ALL
            .into_iter()
            .find_map(|kind| self.pool(kind).get(id).map(|record| (kind, record)))
    }

    pub fn compose_selection(&self) -> &SelectionSet {
        &self.compose_selection
    }

    pub fn edit_selected(&self) -> Option<&ImageRecord> {
        self.edit_selected.and_then(|id| self.edit_models.get(id))
    }

    pub fn edit_upload(&self) -> Option<&ImageFile> {
        self.edit_upload.as_ref()
    }

    pub fn edit_url(&self) -> &str {
        &self.edit_url
    }

    /// Select or deselect a compose source. Fails with a notice at capacity.
    pub fn toggle_compose_selection(&mut self, id: ImageId) -> Result<bool> {
        if !self.compose_sources.contains(id) {
            return Err(StudioError::NotFound(id));
        }
        match self.compose_selection.toggle(id) {
            Ok(selected) => Ok(selected),
            Err(err) => {
                self.notices.push(Notice::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Make a working image the target of the next edit
    pub fn select_for_edit(&mut self, id: ImageId) -> Result<()> {
        if !self.edit_models.contains(id) {
            return Err(StudioError::NotFound(id));
        }
        self.edit_selected = Some(id);
        self.edit_upload = None;
        Ok(())
    }

    pub fn set_edit_url(&mut self, url: impl Into<String>) {
        self.edit_url = url.into();
    }

    /// Use a local file as the edit source; it replaces any selected working image
    pub fn set_edit_upload(&mut self, file: ImageFile) -> Result<()> {
        if let Err(err) = self.config.upload.check(&file) {
            self.notices.push(Notice::error(err.to_string()));
            return Err(err.into());
        }
        self.edit_selected = None;
        self.edit_upload = Some(file);
        Ok(())
    }

    pub fn clear_edit_sources(&mut self) {
        self.edit_selected = None;
        self.edit_upload = None;
        self.edit_url.clear();
    }

    /// Remove a record and drop every selection that points at it.
    ///
    /// Removing the selected working image also drops the raw edit upload.
    pub fn remove_image(&mut self, kind: PoolKind, id: ImageId) -> Result<ImageRecord> {
        let record = self
            .pool_mut(kind)
            .remove(id)
            .ok_or(StudioError::NotFound(id))?;

        self.compose_selection.remove(id);
        if self.edit_selected == Some(id) {
            self.edit_selected = None;
            self.edit_upload = None;
        }
        Ok(record)
    }

    // ---- Uploads -----------------------------------------------------------

    /// Add local files to the compose sources; invalid files are reported and skipped
    pub fn upload_compose_files(&mut self, files: Vec<ImageFile>) -> Result<Vec<ImageId>> {
        let batch = match self.config.upload.check_batch(files) {
            Ok(batch) => batch,
            Err(err) => {
                self.notices.push(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        for reason in &batch.rejected {
            self.notices.push(Notice::error(reason.to_string()));
        }
        if batch.accepted.is_empty() {
            let err = ValidationError::NoValidFiles;
            self.notices.push(Notice::error(err.to_string()));
            return Err(err.into());
        }

        let mut added = Vec::with_capacity(batch.accepted.len());
        for file in batch.accepted {
            let id = self.ids.next_id();
            let record = ImageRecord::new(id, file.to_data_uri(), ImageKind::Uploaded)
                .with_name(file.name.clone())
                .with_file(file);
            self.compose_sources.push_front(record);
            added.push(id);
        }
        Ok(added)
    }

    /// Fetch an image URL and add it to the compose sources
    pub async fn add_compose_url(&mut self, url: &str) -> Result<ImageId> {
        let url = match validate_image_url(url) {
            Ok(url) => url,
            Err(err) => {
                self.notices.push(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        let id = self.ids.next_id();
        let name = format!("image-{}", id);
        let fetcher = Arc::clone(&self.fetcher);
        let file = match transfer::src_to_file(fetcher.as_ref(), &url, &name).await {
            Ok(file) => file,
            Err(err) => {
                self.notices
                    .push(Notice::error(format!("Failed to add image from URL: {}", err)));
                return Err(err);
            }
        };

        let record = ImageRecord::new(id, url, ImageKind::Url)
            .with_name(format!("External Image {}", self.compose_sources.len() + 1))
            .with_file(file);
        self.compose_sources.push_front(record);
        self.notices
            .push(Notice::success("Image added from URL successfully!"));
        Ok(id)
    }

    // ---- Transfers ---------------------------------------------------------

    /// Copy an image into the edit tab and select it.
    ///
    /// Best effort: on failure the error is logged and returned, nothing changes
    /// and no notice is raised.
    pub async fn send_to_edit(&mut self, from: PoolKind, id: ImageId) -> Result<ImageId> {
        let record = self.transfer(from, id).await?;
        let new_id = record.id;
        self.edit_models.push_front(record);
        self.edit_selected = Some(new_id);
        self.edit_upload = None;
        self.edit_url.clear();
        info!(%id, %new_id, "Sent image to edit");
        Ok(new_id)
    }

    /// Copy an image into the compose sources, optionally selecting it.
    ///
    /// Same failure behaviour as [`Studio::send_to_edit`]. When the selection is
    /// full the image is still added, unselected, with a capacity notice.
    pub async fn send_to_compose(
        &mut self,
        from: PoolKind,
        id: ImageId,
        auto_select: bool,
    ) -> Result<ImageId> {
        let record = self.transfer(from, id).await?;
        let new_id = record.id;
        self.compose_sources.push_front(record);
        if auto_select {
            if let Err(err) = self.compose_selection.insert(new_id) {
                self.notices.push(Notice::error(err.to_string()));
            }
        }
        info!(%id, %new_id, "Sent image to compose");
        Ok(new_id)
    }

    async fn transfer(&mut self, from: PoolKind, id: ImageId) -> Result<ImageRecord> {
        let source = self
            .pool(from)
            .get(id)
            .cloned()
            .ok_or(StudioError::NotFound(id))?;
        let new_id = self.ids.next_id();
        let fetcher = Arc::clone(&self.fetcher);

        transfer::transfer_record(fetcher.as_ref(), &source, new_id)
            .await
            .inspect_err(|err| warn!(%id, error = %err, "Image transfer failed"))
    }

    // ---- Downloads ---------------------------------------------------------

    /// Hand a record's source to `saver` under an id-derived filename
    pub fn download(&self, kind: PoolKind, id: ImageId, saver: &dyn ImageSaver) -> Result<PathBuf> {
        let record = self.pool(kind).get(id).ok_or(StudioError::NotFound(id))?;
        saver.save(&record.src, &record.download_name())
    }

    // ---- Requests ----------------------------------------------------------

    /// Validate the tab's form and mark the tab in flight.
    ///
    /// Validation failures raise a notice and never reach the network.
    pub fn begin(&mut self, tab: Tab) -> Result<PendingRequest> {
        if self.tab(tab).in_flight {
            return Err(StudioError::Busy(tab));
        }

        let request = match self.build_request(tab) {
            Ok(request) => request,
            Err(err) => {
                self.tab_mut(tab).last_error = Some(err.to_string());
                self.notices.push(Notice::error(err.to_string()));
                return Err(err.into());
            }
        };

        let source = match tab {
            Tab::Edit => self.edit_selected,
            _ => None,
        };
        let now = self.clock.now();
        let state = self.tab_mut(tab);
        state.in_flight = true;
        state.last_error = None;
        state.progress.start(now);

        info!(tab = tab.as_str(), "Dispatching request");
        Ok(PendingRequest {
            ticket: Ticket {
                tab,
                epoch: state.epoch,
                prompt: request.prompt().to_string(),
                aspect_ratio: request.aspect_ratio(),
                source,
            },
            request,
        })
    }

    /// Apply the outcome of a dispatched request.
    ///
    /// Success inserts the new record and clears the prompt. Errors are
    /// surfaced verbatim and leave the pools alone.
    pub fn complete(&mut self, ticket: Ticket, outcome: Result<String>) -> Result<ImageId> {
        let tab = ticket.tab;
        let now = self.clock.now();
        let state = self.tab_mut(tab);
        if state.epoch != ticket.epoch || !state.in_flight {
            warn!(tab = tab.as_str(), "Discarding response for abandoned request");
            return Err(StudioError::Stale(tab));
        }
        state.in_flight = false;
        state.progress.finish(now);

        match outcome.and_then(|image| self.apply_result(&ticket, &image)) {
            Ok(id) => {
                info!(tab = tab.as_str(), %id, "Request completed");
                self.notices.push(Notice::success(match tab {
                    Tab::Generate => "Image generated",
                    Tab::Edit => "Image edited",
                    Tab::Compose => "Images composed",
                }));
                Ok(id)
            }
            Err(err) => {
                warn!(tab = tab.as_str(), error = %err, "Request failed");
                self.tab_mut(tab).last_error = Some(err.to_string());
                self.notices.push(Notice::error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Validate, dispatch and apply in one go
    pub async fn submit(&mut self, tab: Tab) -> Result<ImageId> {
        let pending = self.begin(tab)?;
        let api = Arc::clone(&self.api);
        let outcome = api.dispatch(&pending.request).await;
        self.complete(pending.ticket, outcome)
    }

    /// Forget the outstanding request of `tab`; its response will be discarded
    pub fn abandon(&mut self, tab: Tab) {
        let state = self.tab_mut(tab);
        state.epoch += 1;
        state.in_flight = false;
        state.progress.reset();
    }

    fn build_request(&self, tab: Tab) -> std::result::Result<ImageRequest, ValidationError> {
        match tab {
            Tab::Generate => request::build_generate(&self.generate.form).map(ImageRequest::Generate),
            Tab::Edit => request::build_edit(
                &self.edit.form,
                self.edit_selected(),
                &self.edit_url,
                self.edit_upload.as_ref(),
            )
            .map(ImageRequest::Edit),
            Tab::Compose => {
                let selected: Vec<&ImageRecord> = self
                    .compose_selection
                    .ids()
                    .iter()
                    .filter_map(|&id| self.compose_sources.get(id))
                    .collect();
                request::build_compose(&self.compose.form, &selected).map(ImageRequest::Compose)
            }
        }
    }

    fn apply_result(&mut self, ticket: &Ticket, image: &str) -> Result<ImageId> {
        // Reject undecodable payloads before anything is stored
        let image = image.trim();
        let bytes = STANDARD.decode(image)?;
        let src = png_data_uri(image);
        let id = self.ids.next_id();
        let mut record = ImageRecord::new(id, src.clone(), ImageKind::Generated)
            .with_prompt(ticket.prompt.clone());
        if let Some(aspect_ratio) = ticket.aspect_ratio {
            record = record.with_aspect_ratio(aspect_ratio);
        }

        match ticket.tab {
            Tab::Generate => {
                self.generated.push_front(record);
            }
            Tab::Edit => {
                record.kind = ImageKind::Edited;
                if let Some(source) = ticket.source {
                    record = record.derived_from(source);
                }

                let model_id = self.ids.next_id();
                let mut model = ImageRecord::new(model_id, src, ImageKind::Model)
                    .with_prompt(ticket.prompt.clone())
                    .with_name("edited-image.png")
                    // The working copy needs real bytes so the next edit can upload it
                    .with_file(ImageFile::new("edited-image.png", "image/png", bytes))
                    .derived_from(id);
                model.aspect_ratio = record.aspect_ratio;

                self.edited.push_front(record);
                self.edit_models.push_front(model);
                self.edit_selected = Some(model_id);
                self.edit_upload = None;
            }
            Tab::Compose => {
                record.kind = ImageKind::Composed;
                self.composed.push_front(record);
                self.compose_selection.clear();
            }
        }

        self.tab_mut(ticket.tab).form.prompt.clear();
        Ok(id)
    }

    // ---- Progress ----------------------------------------------------------

    pub fn progress(&self, tab: Tab) -> u8 {
        self.tab(tab).progress.percent(self.clock.now())
    }

    pub fn progress_state(&self, tab: Tab) -> ProgressState {
        self.tab(tab).progress.state(self.clock.now())
    }

    pub fn progress_stage(&self, tab: Tab) -> ProgressStage {
        ProgressStage::from_percent(self.progress(tab))
    }

    /// Overlay to show for `tab`, if its progress bar is active
    pub fn overlay(&self, tab: Tab) -> Option<Overlay> {
        self.tab(tab)
            .progress
            .is_active(self.clock.now())
            .then(|| Overlay::for_tab(tab))
    }

    /// Advance every tab's progress state machine
    pub fn tick(&mut self) {
        let now = self.clock.now();
        for tab in Tab::ALL {
            self.tab_mut(tab).progress.tick(now);
        }
    }

    // ---- Notices -----------------------------------------------------------

    pub fn pending_notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.pending()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    fn tab(&self, tab: Tab) -> &TabState {
        match tab {
            Tab::Generate => &self.generate,
            Tab::Edit => &self.edit,
            Tab::Compose => &self.compose,
        }
    }

    fn tab_mut(&mut self, tab: Tab) -> &mut TabState {
        match tab {
            Tab::Generate => &mut self.generate,
            Tab::Edit => &mut self.edit,
            Tab::Compose => &mut self.compose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::notice::NoticeLevel;
    use crate::studio::progress::ManualClock;
    use crate::studio::request::{ComposeRequest, EditImage, EditRequest, GenerateRequest};
    use crate::studio::transfer::FetchedImage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and answers with a canned status and body
    struct FakeApi {
        calls: Mutex<Vec<ImageRequest>>,
        status: u16,
        body: String,
    }

    impl FakeApi {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
            })
        }

        fn ok() -> Arc<Self> {
            Self::replying(200, r#"{"image":"AQID"}"#)
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_call(&self) -> Option<ImageRequest> {
            self.calls.lock().unwrap().last().cloned()
        }

        fn answer(&self, request: ImageRequest) -> Result<String> {
            self.calls.lock().unwrap().push(request);
            crate::studio::api::interpret_response(self.status, &self.body)
        }
    }

    #[async_trait]
    impl ImageApi for FakeApi {
        async fn generate(&self, request: &GenerateRequest) -> Result<String> {
            self.answer(ImageRequest::Generate(request.clone()))
        }

        async fn edit(&self, request: &EditRequest) -> Result<String> {
            self.answer(ImageRequest::Edit(request.clone()))
        }

        async fn compose(&self, request: &ComposeRequest) -> Result<String> {
            self.answer(ImageRequest::Compose(request.clone()))
        }
    }

    /// Fetcher that either serves fixed bytes or always fails
    struct FakeFetcher {
        fail: bool,
        calls: Mutex<usize>,
    }

    impl FakeFetcher {
        fn serving() -> Arc<Self> {
            Arc::new(Self {
                fail: false,
                calls: Mutex::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedImage> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(StudioError::Fetch("connection refused".to_string()));
            }
            Ok(FetchedImage {
                bytes: vec![7, 7, 7],
                mime: Some("image/jpeg".to_string()),
            })
        }
    }

    /// Saver that only records what it was asked to save
    #[derive(Default)]
    struct RecordingSaver {
        saved: Mutex<Vec<(String, String)>>,
    }

    impl ImageSaver for RecordingSaver {
        fn save(&self, src: &str, filename: &str) -> Result<PathBuf> {
            self.saved
                .lock()
                .unwrap()
                .push((src.to_string(), filename.to_string()));
            Ok(PathBuf::from(filename))
        }
    }

    fn studio(api: Arc<FakeApi>) -> Studio {
        Studio::new(StudioConfig::default(), api, FakeFetcher::serving())
    }

    fn png(name: &str) -> ImageFile {
        ImageFile::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    fn error_notices(studio: &mut Studio) -> Vec<String> {
        studio
            .drain_notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message)
            .collect()
    }

    #[tokio::test]
    async fn test_blank_prompt_never_calls_api() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        let ids = studio.upload_compose_files(vec![png("a.png")]).unwrap();
        studio.toggle_compose_selection(ids[0]).unwrap();
        studio.set_edit_url("https://example.com/a.png");

        for tab in Tab::ALL {
            studio.set_prompt(tab, "   ");
            let err = studio.submit(tab).await.unwrap_err();
            assert!(matches!(err, StudioError::Validation(ValidationError::EmptyPrompt)));
            assert_eq!(studio.last_error(tab), Some("Please enter a prompt"));
            assert!(!studio.is_in_flight(tab));
        }

        assert_eq!(api.call_count(), 0);
        assert_eq!(error_notices(&mut studio).len(), 3);
    }

    #[tokio::test]
    async fn test_edit_without_source_never_calls_api() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        studio.set_prompt(Tab::Edit, "make it blue");

        let err = studio.submit(Tab::Edit).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(ValidationError::NoEditSource)));
        assert_eq!(api.call_count(), 0);
        assert_eq!(error_notices(&mut studio), vec!["Please select an image to edit"]);
    }

    #[tokio::test]
    async fn test_compose_without_selection_never_calls_api() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        studio.upload_compose_files(vec![png("a.png")]).unwrap();
        studio.set_prompt(Tab::Compose, "merge");

        let err = studio.submit(Tab::Compose).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(ValidationError::EmptySelection)));
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_sixth_selection_is_rejected() {
        let mut studio = studio(FakeApi::ok());
        let files = (0..6).map(|i| png(&format!("{i}.png"))).collect();
        let ids = studio.upload_compose_files(files).unwrap();

        for id in &ids[..5] {
            assert!(studio.toggle_compose_selection(*id).unwrap());
        }
        studio.drain_notices();

        let err = studio.toggle_compose_selection(ids[5]).unwrap_err();
        assert!(matches!(
            err,
            StudioError::Validation(ValidationError::SelectionFull { cap: 5 })
        ));
        assert_eq!(studio.compose_selection().len(), 5);
        assert!(!studio.compose_selection().contains(ids[5]));
        assert_eq!(error_notices(&mut studio), vec!["You can select up to 5 images"]);
    }

    #[tokio::test]
    async fn test_remove_clears_selections() {
        let mut studio = studio(FakeApi::ok());
        let ids = studio.upload_compose_files(vec![png("a.png"), png("b.png")]).unwrap();
        studio.toggle_compose_selection(ids[0]).unwrap();
        studio.toggle_compose_selection(ids[1]).unwrap();

        studio.remove_image(PoolKind::ComposeSources, ids[0]).unwrap();
        assert_eq!(studio.compose_selection().ids(), &[ids[1]]);

        let model = studio
            .send_to_edit(PoolKind::ComposeSources, ids[1])
            .await
            .unwrap();
        assert_eq!(studio.edit_selected().map(|r| r.id), Some(model));
        studio.remove_image(PoolKind::EditModels, model).unwrap();
        assert!(studio.edit_selected().is_none());

        assert!(matches!(
            studio.remove_image(PoolKind::EditModels, model),
            Err(StudioError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_removing_edit_result_drops_earlier_upload() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        studio.set_edit_upload(png("cat.png")).unwrap();
        studio.set_prompt(Tab::Edit, "add a hat");
        studio.submit(Tab::Edit).await.unwrap();
        assert!(studio.edit_upload().is_none());

        let model = studio.edit_selected().map(|r| r.id).unwrap();
        studio.remove_image(PoolKind::EditModels, model).unwrap();

        studio.set_prompt(Tab::Edit, "make it red");
        let err = studio.submit(Tab::Edit).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(ValidationError::NoEditSource)));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_removing_selected_transfer_drops_upload() {
        let mut studio = studio(FakeApi::ok());
        let ids = studio.upload_compose_files(vec![png("a.png")]).unwrap();
        studio.set_edit_upload(png("cat.png")).unwrap();

        let moved = studio
            .send_to_edit(PoolKind::ComposeSources, ids[0])
            .await
            .unwrap();
        assert!(studio.edit_upload().is_none());
        studio.remove_image(PoolKind::EditModels, moved).unwrap();

        studio.set_prompt(Tab::Edit, "sharpen");
        assert!(matches!(
            studio.begin(Tab::Edit),
            Err(StudioError::Validation(ValidationError::NoEditSource))
        ));
    }

    #[tokio::test]
    async fn test_generate_success_appends_record_and_clears_prompt() {
        let api = FakeApi::replying(200, r#"{"message":"Image generated successfully","image":"AQID"}"#);
        let mut studio = studio(api.clone());
        studio.set_prompt(Tab::Generate, "sunset");
        studio.set_aspect_ratio(Tab::Generate, AspectRatio::Widescreen);

        let id = studio.submit(Tab::Generate).await.unwrap();

        let pool = studio.pool(PoolKind::Generated);
        assert_eq!(pool.len(), 1);
        let record = pool.get(id).unwrap();
        assert_eq!(record.kind, ImageKind::Generated);
        assert_eq!(record.src, "data:image/png;base64,AQID");
        assert_eq!(record.prompt.as_deref(), Some("sunset"));
        assert_eq!(record.aspect_ratio, Some(AspectRatio::Widescreen));
        assert!(record.file.is_none());
        assert_eq!(studio.form(Tab::Generate).prompt, "");
        assert!(!studio.is_in_flight(Tab::Generate));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_error_body_never_creates_record() {
        for status in [200, 500] {
            let api = FakeApi::replying(status, r#"{"error":"Model overloaded"}"#);
            let mut studio = studio(api.clone());
            studio.set_prompt(Tab::Generate, "sunset");

            let err = studio.submit(Tab::Generate).await.unwrap_err();
            assert_eq!(err.to_string(), "Model overloaded");
            assert!(studio.pool(PoolKind::Generated).is_empty());
            assert_eq!(studio.last_error(Tab::Generate), Some("Model overloaded"));
            assert_eq!(studio.form(Tab::Generate).prompt, "sunset");
            assert!(!studio.is_in_flight(Tab::Generate));
            assert_eq!(error_notices(&mut studio), vec!["Model overloaded"]);
        }
    }

    #[test]
    fn test_undecodable_payload_never_creates_record() {
        let mut studio = studio(FakeApi::ok());
        let ids = studio.upload_compose_files(vec![png("a.png")]).unwrap();
        studio.toggle_compose_selection(ids[0]).unwrap();
        studio.set_edit_url("https://example.com/a.png");
        studio.drain_notices();

        for (tab, pool) in [
            (Tab::Generate, PoolKind::Generated),
            (Tab::Edit, PoolKind::Edited),
            (Tab::Compose, PoolKind::Composed),
        ] {
            studio.set_prompt(tab, "anything");
            let pending = studio.begin(tab).unwrap();
            let err = studio
                .complete(pending.ticket, Ok("%%% not base64 %%%".to_string()))
                .unwrap_err();

            assert!(matches!(err, StudioError::Decode(_)));
            assert!(studio.pool(pool).is_empty());
            assert!(studio.last_error(tab).is_some());
            assert_eq!(studio.form(tab).prompt, "anything");
            assert!(!studio.is_in_flight(tab));
        }
        assert!(studio.pool(PoolKind::EditModels).is_empty());
        assert_eq!(studio.compose_selection().ids(), &[ids[0]]);
        assert_eq!(error_notices(&mut studio).len(), 3);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error_for_edit() {
        let api = FakeApi::replying(500, r#"{"image":"AQID"}"#);
        let mut studio = studio(api.clone());
        studio.set_prompt(Tab::Edit, "sharpen");
        studio.set_edit_upload(png("in.png")).unwrap();

        let err = studio.submit(Tab::Edit).await.unwrap_err();
        assert!(matches!(err, StudioError::Http { status: 500, .. }));
        assert!(studio.pool(PoolKind::Edited).is_empty());
        assert!(studio.pool(PoolKind::EditModels).is_empty());
    }

    #[test]
    fn test_download_uses_src_and_id_without_network() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        let ids = studio.upload_compose_files(vec![png("a.png")]).unwrap();
        let saver = RecordingSaver::default();

        studio
            .download(PoolKind::ComposeSources, ids[0], &saver)
            .unwrap();

        let saved = saver.saved.lock().unwrap();
        let src = &studio.pool(PoolKind::ComposeSources).get(ids[0]).unwrap().src;
        assert_eq!(saved.as_slice(), &[(src.clone(), format!("image-{}.png", ids[0]))]);
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_chains_on_result() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        studio.set_prompt(Tab::Edit, "add a hat");
        studio.set_edit_upload(png("cat.png")).unwrap();

        let edited = studio.submit(Tab::Edit).await.unwrap();
        match api.last_call() {
            Some(ImageRequest::Edit(request)) => {
                assert_eq!(request.image, EditImage::File(png("cat.png")));
                assert_eq!(request.prompt, "add a hat");
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let record = studio.pool(PoolKind::Edited).get(edited).unwrap();
        assert_eq!(record.kind, ImageKind::Edited);

        // The result becomes the selected working image for the next edit
        let model = studio.edit_selected().unwrap();
        assert_eq!(model.kind, ImageKind::Model);
        assert_eq!(model.derived_from, Some(edited));
        assert_eq!(model.file.as_ref().unwrap().bytes, vec![1, 2, 3]);
        let model_id = model.id;

        studio.set_prompt(Tab::Edit, "make the hat red");
        let second = studio.submit(Tab::Edit).await.unwrap();
        match api.last_call() {
            Some(ImageRequest::Edit(request)) => match request.image {
                EditImage::File(file) => assert_eq!(file.bytes, vec![1, 2, 3]),
                EditImage::Url(url) => panic!("unexpected url source {}", url),
            },
            other => panic!("unexpected request: {:?}", other),
        }
        let record = studio.pool(PoolKind::Edited).get(second).unwrap();
        assert_eq!(record.derived_from, Some(model_id));
    }

    #[tokio::test]
    async fn test_compose_sends_selection_and_clears_it() {
        let api = FakeApi::ok();
        let mut studio = studio(api.clone());
        let ids = studio
            .upload_compose_files(vec![png("a.png"), png("b.png"), png("c.png")])
            .unwrap();
        studio.toggle_compose_selection(ids[2]).unwrap();
        studio.toggle_compose_selection(ids[0]).unwrap();
        studio.set_prompt(Tab::Compose, "collage");

        let id = studio.submit(Tab::Compose).await.unwrap();

        match api.last_call() {
            Some(ImageRequest::Compose(request)) => {
                let names: Vec<&str> = request.images.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["c.png", "a.png"]);
            }
            other => panic!("unexpected request: {:?}", other),
        }
        assert_eq!(
            studio.pool(PoolKind::Composed).get(id).map(|r| r.kind),
            Some(ImageKind::Composed)
        );
        assert!(studio.compose_selection().is_empty());
        assert_eq!(studio.form(Tab::Compose).prompt, "");
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_busy() {
        let mut studio = studio(FakeApi::ok());
        studio.set_prompt(Tab::Generate, "sunset");

        let pending = studio.begin(Tab::Generate).unwrap();
        assert!(studio.is_in_flight(Tab::Generate));
        assert!(matches!(
            studio.begin(Tab::Generate),
            Err(StudioError::Busy(Tab::Generate))
        ));

        // Other tabs are independent
        studio.set_prompt(Tab::Edit, "x");
        studio.set_edit_url("https://example.com/a.png");
        assert!(studio.begin(Tab::Edit).is_ok());

        studio
            .complete(pending.ticket, Ok("AQID".to_string()))
            .unwrap();
        assert!(!studio.is_in_flight(Tab::Generate));
    }

    #[test]
    fn test_abandoned_request_never_writes() {
        let mut studio = studio(FakeApi::ok());
        studio.set_prompt(Tab::Generate, "sunset");

        let pending = studio.begin(Tab::Generate).unwrap();
        studio.abandon(Tab::Generate);
        assert!(!studio.is_in_flight(Tab::Generate));

        let err = studio
            .complete(pending.ticket, Ok("AQID".to_string()))
            .unwrap_err();
        assert!(matches!(err, StudioError::Stale(Tab::Generate)));
        assert!(studio.pool(PoolKind::Generated).is_empty());
        assert_eq!(studio.form(Tab::Generate).prompt, "sunset");

        // A fresh request after abandoning goes through normally
        let pending = studio.begin(Tab::Generate).unwrap();
        assert!(studio.complete(pending.ticket, Ok("AQID".to_string())).is_ok());
        assert_eq!(studio.pool(PoolKind::Generated).len(), 1);
    }

    #[test]
    fn test_progress_follows_request_lifecycle() {
        let clock = ManualClock::new();
        let mut studio = studio(FakeApi::ok()).with_clock(Arc::new(clock.clone()));
        studio.set_prompt(Tab::Generate, "sunset");
        assert_eq!(studio.progress_state(Tab::Generate), ProgressState::Idle);
        assert!(studio.overlay(Tab::Generate).is_none());

        let pending = studio.begin(Tab::Generate).unwrap();
        clock.advance(Duration::from_millis(450));
        assert_eq!(studio.progress(Tab::Generate), 40);
        assert_eq!(studio.progress_stage(Tab::Generate), ProgressStage::Processing);
        assert_eq!(studio.overlay(Tab::Generate), Some(Overlay::PaintBrush));

        clock.advance(Duration::from_secs(30));
        assert_eq!(studio.progress(Tab::Generate), 90);

        // Failure still completes the bar
        studio
            .complete(pending.ticket, Err(StudioError::Network("timeout".to_string())))
            .unwrap_err();
        assert_eq!(studio.progress(Tab::Generate), 100);

        clock.advance(Duration::from_secs(2));
        studio.tick();
        assert_eq!(studio.progress_state(Tab::Generate), ProgressState::Idle);
        assert_eq!(studio.progress(Tab::Generate), 0);
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_pools_unchanged() {
        let fetcher = FakeFetcher::failing();
        let mut studio = Studio::new(StudioConfig::default(), FakeApi::ok(), fetcher.clone());
        studio.set_prompt(Tab::Generate, "sunset");
        let generated = studio.submit(Tab::Generate).await.unwrap();
        studio.drain_notices();

        // Data URIs decode locally, so force a remote source through a URL record
        let url_record = ImageRecord::new(ImageId(1), "https://example.com/x.png", ImageKind::Url);
        studio.compose_sources.push_front(url_record);

        assert!(studio.send_to_edit(PoolKind::ComposeSources, ImageId(1)).await.is_err());
        assert!(studio
            .send_to_compose(PoolKind::ComposeSources, ImageId(1), true)
            .await
            .is_err());
        assert_eq!(fetcher.call_count(), 2);

        assert!(studio.pool(PoolKind::EditModels).is_empty());
        assert_eq!(studio.pool(PoolKind::ComposeSources).len(), 1);
        assert!(studio.compose_selection().is_empty());
        assert!(studio.edit_selected().is_none());
        assert_eq!(studio.drain_notices(), Vec::<Notice>::new());

        // The generated image itself transfers fine without any fetch
        let moved = studio
            .send_to_compose(PoolKind::Generated, generated, true)
            .await
            .unwrap();
        assert!(studio.compose_selection().contains(moved));
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_send_to_edit_carries_metadata_and_clears_url() {
        let mut studio = studio(FakeApi::ok());
        studio.set_prompt(Tab::Generate, "a lighthouse");
        studio.set_aspect_ratio(Tab::Generate, AspectRatio::Portrait9x16);
        let generated = studio.submit(Tab::Generate).await.unwrap();
        studio.set_edit_url("https://example.com/old.png");

        let moved = studio.send_to_edit(PoolKind::Generated, generated).await.unwrap();
        let record = studio.pool(PoolKind::EditModels).get(moved).unwrap();
        assert_eq!(record.kind, ImageKind::Transferred);
        assert_eq!(record.prompt.as_deref(), Some("a lighthouse"));
        assert_eq!(record.aspect_ratio, Some(AspectRatio::Portrait9x16));
        assert_eq!(record.file.as_ref().unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(studio.edit_selected().map(|r| r.id), Some(moved));
        assert_eq!(studio.edit_url(), "");
    }

    #[tokio::test]
    async fn test_send_to_compose_at_capacity_adds_unselected() {
        let mut studio = studio(FakeApi::ok());
        let files = (0..5).map(|i| png(&format!("{i}.png"))).collect();
        for id in studio.upload_compose_files(files).unwrap() {
            studio.toggle_compose_selection(id).unwrap();
        }
        studio.set_prompt(Tab::Generate, "sunset");
        let generated = studio.submit(Tab::Generate).await.unwrap();
        studio.drain_notices();

        let moved = studio
            .send_to_compose(PoolKind::Generated, generated, true)
            .await
            .unwrap();
        assert_eq!(studio.pool(PoolKind::ComposeSources).first().map(|r| r.id), Some(moved));
        assert!(!studio.compose_selection().contains(moved));
        assert_eq!(error_notices(&mut studio), vec!["You can select up to 5 images"]);
    }

    #[tokio::test]
    async fn test_add_compose_url() {
        let fetcher = FakeFetcher::serving();
        let mut studio = Studio::new(StudioConfig::default(), FakeApi::ok(), fetcher.clone());

        let id = studio.add_compose_url(" https://example.com/cat ").await.unwrap();
        let record = studio.pool(PoolKind::ComposeSources).get(id).unwrap();
        assert_eq!(record.kind, ImageKind::Url);
        assert_eq!(record.src, "https://example.com/cat");
        assert_eq!(record.file.as_ref().unwrap().mime, "image/jpeg");

        assert!(studio.add_compose_url("not a url").await.is_err());
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(studio.pool(PoolKind::ComposeSources).len(), 1);
    }

    #[tokio::test]
    async fn test_add_compose_url_failure_raises_notice() {
        let mut studio = Studio::new(StudioConfig::default(), FakeApi::ok(), FakeFetcher::failing());

        assert!(studio.add_compose_url("https://example.com/cat.png").await.is_err());
        assert!(studio.pool(PoolKind::ComposeSources).is_empty());
        let errors = error_notices(&mut studio);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to add image from URL"));
    }

    #[test]
    fn test_upload_reports_invalid_files() {
        let mut studio = studio(FakeApi::ok());
        let text = ImageFile::new("notes.txt", "text/plain", b"hello".to_vec());

        let added = studio
            .upload_compose_files(vec![png("a.png"), text.clone()])
            .unwrap();
        assert_eq!(added.len(), 1);
        let record = studio.pool(PoolKind::ComposeSources).get(added[0]).unwrap();
        assert_eq!(record.kind, ImageKind::Uploaded);
        assert!(record.src.starts_with("data:image/png;base64,"));
        assert_eq!(error_notices(&mut studio).len(), 1);

        let err = studio.upload_compose_files(vec![text]).unwrap_err();
        assert!(matches!(err, StudioError::Validation(ValidationError::NoValidFiles)));
        assert_eq!(
            error_notices(&mut studio).last().map(String::as_str),
            Some("No valid files found")
        );
    }
}
