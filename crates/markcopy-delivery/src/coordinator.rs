//! Delivery Coordinator: gets a conversion command to a tab's agent,
//! injecting and retrying as needed, and tells the user when it cannot.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use markcopy_core::{
    AgentRequest, AgentResponse, ConversionIntent, CoordinatorRequest, Error, IntentSource,
    RequestResult, Result, TabId, CONTEXT_MENU_ID, COPY_COMMAND,
};
use parking_lot::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::host::{BrowserHost, Notifier};
use crate::state::{DeliveryMachine, DeliveryState, TransitionRecord};
use crate::url::is_restricted_url;

pub const NOTIFICATION_TITLE: &str = "Copy as Markdown";
pub const RESTRICTED_PAGE_MESSAGE: &str =
    "Cannot copy from this page. Browser internal and extension pages are restricted.";
pub const DELIVERY_FAILED_MESSAGE: &str = "Failed to copy. Please refresh the page and try again.";

/// How the command reached the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    /// The agent was already resident.
    Direct,
    /// The agent had to be injected first.
    Injected,
}

/// A completed delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tab: TabId,
    pub path: DeliveryPath,
    pub response: AgentResponse,
    /// Slow-path retries used (0 when the first attempt succeeded).
    pub retries: u32,
    pub transitions: Vec<TransitionRecord>,
}

/// Removes its tab from the in-flight set when dropped.
struct InFlight<'a> {
    tabs: &'a Mutex<HashSet<TabId>>,
    tab: TabId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.tabs.lock().remove(&self.tab);
    }
}

pub struct DeliveryCoordinator {
    host: Arc<dyn BrowserHost>,
    notifier: Arc<dyn Notifier>,
    config: DeliveryConfig,
    /// Tabs with a dispatch running; only consulted when coalescing.
    in_flight: Mutex<HashSet<TabId>>,
}

impl DeliveryCoordinator {
    pub fn new(
        host: Arc<dyn BrowserHost>,
        notifier: Arc<dyn Notifier>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            host,
            notifier,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    // ---------------------------------------------------------------
    // Triggers
    // ---------------------------------------------------------------

    /// Context-menu activation. Other menu ids, and activations without a
    /// tab, are ignored.
    pub async fn on_context_menu(&self, menu_id: &str, tab: Option<TabId>) -> Option<Result<Delivery>> {
        if menu_id != CONTEXT_MENU_ID {
            return None;
        }
        let Some(tab) = tab else {
            debug!("Context menu activation without a tab ignored");
            return None;
        };
        Some(
            self.dispatch(ConversionIntent::new(IntentSource::ContextMenu), tab)
                .await,
        )
    }

    /// Keyboard command. Only `copy_markdown` is handled.
    pub async fn on_command(&self, command: &str) -> Option<Result<Delivery>> {
        if command != COPY_COMMAND {
            debug!("Ignoring command {}", command);
            return None;
        }
        let Some(tab) = self.host.active_tab().await else {
            debug!("Command {} with no active tab ignored", command);
            return None;
        };
        Some(
            self.dispatch(ConversionIntent::new(IntentSource::Command), tab)
                .await,
        )
    }

    /// Messages from the settings panel.
    pub async fn handle_runtime_message(&self, request: &CoordinatorRequest) -> RequestResult {
        match request {
            CoordinatorRequest::CopyFromPopup => match self.host.active_tab().await {
                Some(tab) => {
                    self.respond_to_request(ConversionIntent::new(IntentSource::Popup), tab)
                        .await
                }
                None => RequestResult::failure(Error::NoActiveTab.to_string()),
            },
        }
    }

    /// Same protocol as [`dispatch`](Self::dispatch), with the outcome
    /// returned to the caller.
    pub async fn respond_to_request(&self, intent: ConversionIntent, tab: TabId) -> RequestResult {
        match self.dispatch(intent, tab).await {
            Ok(_) => RequestResult::success(),
            Err(e) => RequestResult::failure(e.to_string()),
        }
    }

    // ---------------------------------------------------------------
    // Delivery
    // ---------------------------------------------------------------

    /// Deliver `intent` to the agent in `tab`.
    ///
    /// Restricted pages fail immediately. Otherwise a resident agent gets
    /// the command directly; failing that, the agent is injected and the
    /// command sent once readiness is confirmed, with the whole slow path
    /// retried up to `max_retries` times. Every terminal failure is
    /// notified.
    pub async fn dispatch(&self, intent: ConversionIntent, tab: TabId) -> Result<Delivery> {
        let _guard = if self.config.coalesce_concurrent {
            if !self.in_flight.lock().insert(tab) {
                warn!("Dropping {} dispatch: tab {} already has one running", intent.source, tab);
                return Err(Error::DeliveryInProgress(tab.0));
            }
            Some(InFlight {
                tabs: &self.in_flight,
                tab,
            })
        } else {
            None
        };

        let id = Uuid::new_v4().simple().to_string();
        let id = &id[..8];
        info!("Dispatch {} ({}) to tab {}", id, intent.source, tab);

        let mut machine = DeliveryMachine::new();
        let result = self.run(&intent, tab, &mut machine).await;
        match &result {
            Ok((path, _)) => info!("Dispatch {} delivered via {:?}", id, path),
            Err(e) => warn!("Dispatch {} failed: {}", id, e),
        }

        let retries = machine.attempt();
        let transitions = machine.into_transitions();
        result.map(|(path, response)| Delivery {
            tab,
            path,
            response,
            retries,
            transitions,
        })
    }

    async fn run(
        &self,
        intent: &ConversionIntent,
        tab: TabId,
        machine: &mut DeliveryMachine,
    ) -> Result<(DeliveryPath, AgentResponse)> {
        let url = self.host.tab_url(tab).await.unwrap_or_default();
        if is_restricted_url(&url) {
            machine.advance(DeliveryState::TerminalFailure, Some("restricted page"))?;
            self.notify(RESTRICTED_PAGE_MESSAGE);
            return Err(Error::RestrictedPage(url));
        }

        let request = intent.to_request();

        machine.advance(DeliveryState::ProbingFast, None)?;
        if self.fast_probe(tab).await {
            match self.send_command(tab, &request).await {
                Ok(response) => {
                    machine.advance(DeliveryState::Delivered, Some("agent resident"))?;
                    return Ok((DeliveryPath::Direct, response));
                }
                // The agent may have just unloaded; the slow path reloads it.
                Err(e) => debug!("Direct send to tab {} failed: {}", tab, e),
            }
        }

        machine.advance(DeliveryState::ProbingSlow, None)?;
        let total = self.config.total_attempts();
        for attempt in 0..total {
            if attempt > 0 {
                sleep(self.config.retry_delay()).await;
                machine.set_attempt(attempt);
                machine.advance(DeliveryState::ProbingSlow, None)?;
            }

            match self.slow_attempt(tab, &request, machine).await? {
                Ok(response) => {
                    machine.advance(DeliveryState::Delivered, None)?;
                    return Ok((DeliveryPath::Injected, response));
                }
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "Delivery attempt {}/{} to tab {} failed: {}",
                        attempt + 1,
                        total,
                        tab,
                        e
                    );
                    machine.advance(DeliveryState::RetryOrFail, Some(&e.to_string()))?;
                }
                Err(e) => {
                    machine.advance(DeliveryState::TerminalFailure, Some(&e.to_string()))?;
                    self.notify(DELIVERY_FAILED_MESSAGE);
                    return Err(e);
                }
            }
        }

        machine.advance(DeliveryState::TerminalFailure, Some("retries exhausted"))?;
        let url = self.host.tab_url(tab).await.unwrap_or_default();
        if is_restricted_url(&url) {
            self.notify(RESTRICTED_PAGE_MESSAGE);
        } else {
            self.notify(DELIVERY_FAILED_MESSAGE);
        }
        Err(Error::DeliveryExhausted { attempts: total })
    }

    /// One inject → confirm → send pass. The outer `Result` carries state
    /// machine faults; the inner one the attempt's outcome.
    async fn slow_attempt(
        &self,
        tab: TabId,
        request: &AgentRequest,
        machine: &mut DeliveryMachine,
    ) -> Result<Result<AgentResponse>> {
        machine.advance(DeliveryState::Injecting, None)?;
        let limit = self.config.inject_timeout();
        let inject = self.host.inject_agent(tab, &self.config.agent_scripts);
        let injected = match timeout(limit, inject).await {
            Ok(result) => result,
            Err(_) => Err(Error::InjectionFailed(format!(
                "no answer within {}ms",
                limit.as_millis()
            ))),
        };
        if let Err(e) = injected {
            return Ok(Err(match e {
                Error::InjectionFailed(_) => e,
                other => Error::InjectionFailed(other.to_string()),
            }));
        }

        machine.advance(DeliveryState::ProbingReady, None)?;
        if !self.ready_probe(tab).await {
            return Ok(Err(Error::AgentUnreachable(format!(
                "agent not ready after {} probes",
                self.config.ready_probe_attempts
            ))));
        }

        machine.advance(DeliveryState::Delivering, None)?;
        Ok(self.send_command(tab, request).await)
    }

    /// Short probe for an already-resident agent.
    async fn fast_probe(&self, tab: TabId) -> bool {
        for attempt in 1..=self.config.fast_probe_attempts {
            if attempt > 1 {
                sleep(self.config.fast_probe_interval()).await;
            }
            if self.ping(tab).await {
                return true;
            }
        }
        false
    }

    /// Probe after injection, each attempt waiting longer than the last.
    async fn ready_probe(&self, tab: TabId) -> bool {
        for attempt in 1..=self.config.ready_probe_attempts {
            sleep(self.config.ready_backoff(attempt)).await;
            if self.ping(tab).await {
                debug!("Agent in tab {} ready after {} probes", tab, attempt);
                return true;
            }
        }
        false
    }

    async fn ping(&self, tab: TabId) -> bool {
        match timeout(
            self.config.probe_timeout(),
            self.host.send_message(tab, &AgentRequest::Ping),
        )
        .await
        {
            Ok(Ok(response)) => response.is_ready(),
            Ok(Err(_)) | Err(_) => false,
        }
    }

    async fn send_command(&self, tab: TabId, request: &AgentRequest) -> Result<AgentResponse> {
        send_with_timeout(
            self.host.as_ref(),
            tab,
            request,
            self.config.command_timeout(),
        )
        .await
    }

    fn notify(&self, message: &str) {
        self.notifier.notify(NOTIFICATION_TITLE, message);
    }
}

async fn send_with_timeout(
    host: &dyn BrowserHost,
    tab: TabId,
    request: &AgentRequest,
    limit: Duration,
) -> Result<AgentResponse> {
    match timeout(limit, host.send_message(tab, request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(Error::AgentUnreachable(e))) => Err(Error::AgentUnreachable(e)),
        Ok(Err(e)) => Err(Error::AgentUnreachable(e.to_string())),
        Err(_) => Err(Error::AgentUnreachable(format!(
            "no answer within {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingNotifier;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Scriptable browser with a single tab.
    #[derive(Default)]
    struct MockHost {
        url: RwLock<String>,
        /// URL the tab switches to on first injection.
        url_after_inject: Option<String>,
        active: bool,
        loaded: AtomicBool,
        load_on_inject: bool,
        inject_failures: AtomicU32,
        copy_send_failures: AtomicU32,
        injections: AtomicU32,
        copies: AtomicU32,
        /// Injection never resolves.
        inject_hangs: bool,
    }

    impl MockHost {
        fn on(url: &str) -> Self {
            Self {
                url: RwLock::new(url.to_string()),
                active: true,
                load_on_inject: true,
                ..Default::default()
            }
        }

        fn resident(self) -> Self {
            self.loaded.store(true, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl BrowserHost for MockHost {
        async fn tab_url(&self, _: TabId) -> Option<String> {
            Some(self.url.read().clone())
        }

        async fn active_tab(&self) -> Option<TabId> {
            self.active.then_some(TabId(7))
        }

        async fn send_message(&self, _: TabId, request: &AgentRequest) -> Result<AgentResponse> {
            if !self.loaded.load(Ordering::SeqCst) {
                return Err(Error::AgentUnreachable("Receiving end does not exist".into()));
            }
            match request {
                AgentRequest::Ping => Ok(AgentResponse::ready()),
                AgentRequest::CopyMarkdown { .. } => {
                    let remaining = self.copy_send_failures.load(Ordering::SeqCst);
                    if remaining > 0 {
                        self.copy_send_failures.store(remaining - 1, Ordering::SeqCst);
                        return Err(Error::AgentUnreachable("port closed".into()));
                    }
                    self.copies.fetch_add(1, Ordering::SeqCst);
                    Ok(AgentResponse::ok())
                }
            }
        }

        async fn inject_agent(&self, _: TabId, scripts: &[String]) -> Result<()> {
            assert!(!scripts.is_empty());
            self.injections.fetch_add(1, Ordering::SeqCst);
            if self.inject_hangs {
                std::future::pending::<()>().await;
            }
            if let Some(url) = &self.url_after_inject {
                *self.url.write() = url.clone();
            }
            let failures = self.inject_failures.load(Ordering::SeqCst);
            if failures > 0 {
                self.inject_failures.store(failures - 1, Ordering::SeqCst);
                return Err(Error::InjectionFailed("Cannot access contents of the page".into()));
            }
            if self.load_on_inject {
                self.loaded.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn quick_config() -> DeliveryConfig {
        DeliveryConfig {
            fast_probe_interval_ms: 1,
            probe_timeout_ms: 50,
            command_timeout_ms: 50,
            inject_timeout_ms: 50,
            backoff_step_ms: 1,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn coordinator(host: MockHost) -> (DeliveryCoordinator, Arc<MockHost>, Arc<RecordingNotifier>) {
        coordinator_with(host, quick_config())
    }

    fn coordinator_with(
        host: MockHost,
        config: DeliveryConfig,
    ) -> (DeliveryCoordinator, Arc<MockHost>, Arc<RecordingNotifier>) {
        let host = Arc::new(host);
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = DeliveryCoordinator::new(host.clone(), notifier.clone(), config);
        (coordinator, host, notifier)
    }

    fn intent() -> ConversionIntent {
        ConversionIntent::new(IntentSource::Command)
    }

    #[tokio::test]
    async fn test_restricted_page_never_injects() {
        let (coordinator, host, notifier) = coordinator(MockHost::on("chrome://settings"));
        let err = coordinator.dispatch(intent(), TabId(7)).await.unwrap_err();
        assert!(matches!(err, Error::RestrictedPage(_)));
        assert_eq!(host.injections.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.messages(), vec![RESTRICTED_PAGE_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_resident_agent_gets_command_directly() {
        let (coordinator, host, notifier) = coordinator(MockHost::on("https://example.com").resident());
        let delivery = coordinator.dispatch(intent(), TabId(7)).await.unwrap();
        assert_eq!(delivery.path, DeliveryPath::Direct);
        assert_eq!(host.injections.load(Ordering::SeqCst), 0);
        assert_eq!(host.copies.load(Ordering::SeqCst), 1);
        assert!(notifier.sent().is_empty());
        let states: Vec<DeliveryState> = delivery.transitions.iter().map(|t| t.to).collect();
        assert_eq!(states, vec![DeliveryState::ProbingFast, DeliveryState::Delivered]);
    }

    #[tokio::test]
    async fn test_missing_agent_is_injected() {
        let (coordinator, host, _) = coordinator(MockHost::on("https://example.com"));
        let delivery = coordinator.dispatch(intent(), TabId(7)).await.unwrap();
        assert_eq!(delivery.path, DeliveryPath::Injected);
        assert_eq!(delivery.retries, 0);
        assert_eq!(host.injections.load(Ordering::SeqCst), 1);
        assert_eq!(host.copies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_failure_after_probe_falls_through() {
        let host = MockHost::on("https://example.com").resident();
        host.copy_send_failures.store(1, Ordering::SeqCst);
        let (coordinator, host, _) = coordinator(host);
        let delivery = coordinator.dispatch(intent(), TabId(7)).await.unwrap();
        assert_eq!(delivery.path, DeliveryPath::Injected);
        assert_eq!(host.injections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_injection_failure_is_retried() {
        let host = MockHost::on("https://example.com");
        host.inject_failures.store(1, Ordering::SeqCst);
        let (coordinator, host, notifier) = coordinator(host);
        let delivery = coordinator.dispatch(intent(), TabId(7)).await.unwrap();
        assert_eq!(delivery.retries, 1);
        assert_eq!(host.injections.load(Ordering::SeqCst), 2);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_never_ready_exhausts_retry_ceiling() {
        let host = MockHost {
            load_on_inject: false,
            ..MockHost::on("https://example.com")
        };
        let (coordinator, host, notifier) = coordinator(host);
        let err = coordinator.dispatch(intent(), TabId(7)).await.unwrap_err();
        assert!(matches!(err, Error::DeliveryExhausted { attempts: 3 }));
        assert_eq!(host.injections.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.messages(), vec![DELIVERY_FAILED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_hung_injection_is_capped() {
        let host = MockHost {
            inject_hangs: true,
            ..MockHost::on("https://example.com")
        };
        let (coordinator, host, notifier) = coordinator(host);
        let err = coordinator.dispatch(intent(), TabId(7)).await.unwrap_err();
        assert!(matches!(err, Error::DeliveryExhausted { attempts: 3 }));
        assert_eq!(host.injections.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.messages(), vec![DELIVERY_FAILED_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_page_turned_restricted_is_reported_as_such() {
        let host = MockHost {
            load_on_inject: false,
            url_after_inject: Some("chrome://newtab".into()),
            ..MockHost::on("https://example.com")
        };
        let (coordinator, _, notifier) = coordinator(host);
        assert!(coordinator.dispatch(intent(), TabId(7)).await.is_err());
        assert_eq!(notifier.messages(), vec![RESTRICTED_PAGE_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_popup_request_results() {
        let (coordinator, _, _) = coordinator(MockHost::on("https://example.com"));
        let result = coordinator
            .handle_runtime_message(&CoordinatorRequest::CopyFromPopup)
            .await;
        assert_eq!(result, RequestResult::success());

        let host = MockHost {
            active: false,
            ..MockHost::on("https://example.com")
        };
        let (coordinator, _, _) = self::coordinator(host);
        let result = coordinator
            .handle_runtime_message(&CoordinatorRequest::CopyFromPopup)
            .await;
        assert_eq!(result, RequestResult::failure("No active tab"));
    }

    #[tokio::test]
    async fn test_trigger_filtering() {
        let (coordinator, host, _) = coordinator(MockHost::on("https://example.com").resident());
        assert!(coordinator.on_command("open_options").await.is_none());
        assert!(coordinator.on_context_menu(CONTEXT_MENU_ID, None).await.is_none());
        assert!(coordinator.on_context_menu("other-menu", Some(TabId(7))).await.is_none());
        assert_eq!(host.copies.load(Ordering::SeqCst), 0);

        assert!(coordinator.on_command(COPY_COMMAND).await.unwrap().is_ok());
        assert!(coordinator
            .on_context_menu(CONTEXT_MENU_ID, Some(TabId(7)))
            .await
            .unwrap()
            .is_ok());
        assert_eq!(host.copies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_coalescing_drops_concurrent_dispatch() {
        let config = DeliveryConfig {
            coalesce_concurrent: true,
            ..quick_config()
        };
        let (coordinator, host, _) = coordinator_with(MockHost::on("https://example.com"), config);
        let (first, second) = tokio::join!(
            coordinator.dispatch(intent(), TabId(7)),
            coordinator.dispatch(intent(), TabId(7))
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::DeliveryInProgress(7))));
        assert_eq!(host.copies.load(Ordering::SeqCst), 1);

        // The guard is released once the first dispatch ends.
        assert!(coordinator.dispatch(intent(), TabId(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_unguarded_by_default() {
        let (coordinator, host, _) = coordinator(MockHost::on("https://example.com"));
        let (first, second) = tokio::join!(
            coordinator.dispatch(intent(), TabId(7)),
            coordinator.dispatch(intent(), TabId(7))
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(host.copies.load(Ordering::SeqCst), 2);
    }
}
