//! A one-tab browser host over a local HTML file.

use std::sync::Arc;

use async_trait::async_trait;
use markcopy_agent::{ContentAgent, Frame, MemoryClipboard, ReadabilityArticle, StaticFrame};
use markcopy_core::{AgentRequest, AgentResponse, Error, Result, SettingsStore, TabId};
use markcopy_delivery::BrowserHost;
use parking_lot::RwLock;
use tracing::debug;

pub const LOCAL_TAB: TabId = TabId(1);

/// Hosts a single page. Injection installs a real agent into it.
pub struct LocalHost {
    frame: Arc<StaticFrame>,
    settings: Arc<dyn SettingsStore>,
    clipboard: Arc<MemoryClipboard>,
    agent: RwLock<Option<Arc<ContentAgent>>>,
}

impl LocalHost {
    pub fn new(frame: Arc<StaticFrame>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            frame,
            settings,
            clipboard: Arc::new(MemoryClipboard::new()),
            agent: RwLock::new(None),
        }
    }

    pub fn frame(&self) -> &StaticFrame {
        &self.frame
    }

    /// Whatever the agent last copied.
    pub fn copied(&self) -> Option<String> {
        self.clipboard.contents()
    }
}

#[async_trait]
impl BrowserHost for LocalHost {
    async fn tab_url(&self, tab: TabId) -> Option<String> {
        (tab == LOCAL_TAB).then(|| self.frame.url())
    }

    async fn active_tab(&self) -> Option<TabId> {
        Some(LOCAL_TAB)
    }

    async fn send_message(&self, tab: TabId, request: &AgentRequest) -> Result<AgentResponse> {
        let agent = if tab == LOCAL_TAB {
            self.agent.read().clone()
        } else {
            None
        };
        let Some(agent) = agent else {
            return Err(Error::AgentUnreachable(format!("No agent in tab {}", tab)));
        };
        agent
            .handle_message(request)
            .await
            .ok_or_else(|| Error::AgentUnreachable("Agent did not answer".into()))
    }

    async fn inject_agent(&self, tab: TabId, scripts: &[String]) -> Result<()> {
        if tab != LOCAL_TAB {
            return Err(Error::InjectionFailed(format!("No tab with id {}", tab)));
        }
        debug!("Injecting {} scripts into tab {}", scripts.len(), tab);
        let agent = ContentAgent::new(self.frame.clone(), self.settings.clone(), self.clipboard.clone())
            .with_readability(Arc::new(ReadabilityArticle));
        if let Some(agent) = agent.install() {
            *self.agent.write() = Some(agent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markcopy_core::{ConversionOptions, MemorySettingsStore};

    fn host(page: &str) -> LocalHost {
        let frame = Arc::new(StaticFrame::new("file:///tmp/page.html", page));
        let settings = Arc::new(MemorySettingsStore::new(ConversionOptions::default()));
        LocalHost::new(frame, settings)
    }

    #[tokio::test]
    async fn test_unreachable_until_injected() {
        let host = host("<body><p>Hello there</p></body>");
        assert!(host.send_message(LOCAL_TAB, &AgentRequest::Ping).await.is_err());

        host.inject_agent(LOCAL_TAB, &[]).await.unwrap();
        let reply = host.send_message(LOCAL_TAB, &AgentRequest::Ping).await.unwrap();
        assert!(reply.is_ready());
    }

    #[tokio::test]
    async fn test_other_tabs_do_not_exist() {
        let host = host("<body></body>");
        assert_eq!(host.tab_url(TabId(9)).await, None);
        assert!(host.inject_agent(TabId(9), &[]).await.is_err());
    }
}
