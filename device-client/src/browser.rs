//! The rendering seam: the rotation engine issues display commands through
//! this trait instead of owning a browser/CEF embedding directly. Actual
//! rendering is an external collaborator out of scope here.

use async_trait::async_trait;
use tokio::sync::Mutex;

use protocol::KeyModifier;

use crate::errors::EngineError;

#[async_trait]
pub trait BrowserController: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;
    async fn refresh(&self) -> Result<(), EngineError>;
    /// Applies a viewport/kiosk-mode change. Geometry changes require the
    /// browser to be re-initialized; callers re-navigate the current item
    /// afterward rather than relying on this call alone to repaint.
    async fn configure(
        &self,
        viewport_width: Option<u32>,
        viewport_height: Option<u32>,
        kiosk_mode: Option<bool>,
    ) -> Result<(), EngineError>;
    async fn click(&self, x: i32, y: i32, button: Option<&str>) -> Result<(), EngineError>;
    async fn type_text(&self, text: &str, selector: Option<&str>) -> Result<(), EngineError>;
    async fn key(&self, key: &str, modifiers: &[KeyModifier]) -> Result<(), EngineError>;
    async fn scroll(&self, x: i32, y: i32) -> Result<(), EngineError>;
    /// `None` when the page is blank or the browser is closed; callers skip
    /// screenshot capture in that case.
    async fn screenshot(&self) -> Result<Option<Vec<u8>>, EngineError>;
    async fn current_url(&self) -> Option<String>;
    async fn is_blank_or_closed(&self) -> bool;
}

/// Logs every call and tracks just enough state to behave sensibly under
/// the engine's own tests.
pub struct NullBrowser {
    current_url: Mutex<Option<String>>,
}

impl NullBrowser {
    pub fn new() -> Self {
        Self {
            current_url: Mutex::new(None),
        }
    }
}

impl Default for NullBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserController for NullBrowser {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        tracing::info!(url, "navigate");
        *self.current_url.lock().await = Some(url.to_string());
        Ok(())
    }

    async fn refresh(&self) -> Result<(), EngineError> {
        tracing::info!("refresh");
        Ok(())
    }

    async fn configure(
        &self,
        viewport_width: Option<u32>,
        viewport_height: Option<u32>,
        kiosk_mode: Option<bool>,
    ) -> Result<(), EngineError> {
        tracing::info!(?viewport_width, ?viewport_height, ?kiosk_mode, "configure");
        Ok(())
    }

    async fn click(&self, x: i32, y: i32, button: Option<&str>) -> Result<(), EngineError> {
        tracing::info!(x, y, ?button, "click");
        Ok(())
    }

    async fn type_text(&self, text: &str, selector: Option<&str>) -> Result<(), EngineError> {
        tracing::info!(text, ?selector, "type_text");
        Ok(())
    }

    async fn key(&self, key: &str, modifiers: &[KeyModifier]) -> Result<(), EngineError> {
        tracing::info!(key, ?modifiers, "key");
        Ok(())
    }

    async fn scroll(&self, x: i32, y: i32) -> Result<(), EngineError> {
        tracing::info!(x, y, "scroll");
        Ok(())
    }

    async fn screenshot(&self) -> Result<Option<Vec<u8>>, EngineError> {
        if self.is_blank_or_closed().await {
            return Ok(None);
        }
        Ok(Some(Vec::new()))
    }

    async fn current_url(&self) -> Option<String> {
        self.current_url.lock().await.clone()
    }

    async fn is_blank_or_closed(&self) -> bool {
        self.current_url.lock().await.is_none()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records every call so engine tests can assert on navigation order
    /// without a real renderer.
    #[derive(Default)]
    pub struct RecordingBrowser {
        pub navigations: StdMutex<Vec<String>>,
        pub fail_urls: StdMutex<Vec<String>>,
        pub configures: StdMutex<Vec<(Option<u32>, Option<u32>, Option<bool>)>>,
        url: Mutex<Option<String>>,
    }

    impl RecordingBrowser {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next navigation to `url` fail once.
        pub fn fail_once(&self, url: &str) {
            self.fail_urls.lock().unwrap().push(url.to_string());
        }
    }

    #[async_trait]
    impl BrowserController for RecordingBrowser {
        async fn navigate(&self, url: &str) -> Result<(), EngineError> {
            let mut fails = self.fail_urls.lock().unwrap();
            if let Some(pos) = fails.iter().position(|u| u == url) {
                fails.remove(pos);
                return Err(EngineError::Navigation(url.to_string()));
            }
            drop(fails);
            self.navigations.lock().unwrap().push(url.to_string());
            *self.url.lock().await = Some(url.to_string());
            Ok(())
        }

        async fn refresh(&self) -> Result<(), EngineError> {
            Ok(())
        }

        async fn configure(
            &self,
            viewport_width: Option<u32>,
            viewport_height: Option<u32>,
            kiosk_mode: Option<bool>,
        ) -> Result<(), EngineError> {
            self.configures
                .lock()
                .unwrap()
                .push((viewport_width, viewport_height, kiosk_mode));
            Ok(())
        }

        async fn click(&self, _x: i32, _y: i32, _button: Option<&str>) -> Result<(), EngineError> {
            Ok(())
        }

        async fn type_text(&self, _text: &str, _selector: Option<&str>) -> Result<(), EngineError> {
            Ok(())
        }

        async fn key(&self, _key: &str, _modifiers: &[KeyModifier]) -> Result<(), EngineError> {
            Ok(())
        }

        async fn scroll(&self, _x: i32, _y: i32) -> Result<(), EngineError> {
            Ok(())
        }

        async fn screenshot(&self) -> Result<Option<Vec<u8>>, EngineError> {
            Ok(Some(Vec::new()))
        }

        async fn current_url(&self) -> Option<String> {
            self.url.lock().await.clone()
        }

        async fn is_blank_or_closed(&self) -> bool {
            self.url.lock().await.is_none()
        }
    }
}
