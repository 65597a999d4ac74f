//! # Engine Selection Facade
//!
//! The single entry point callers use for transcription. Picks the best
//! available backend and hides the fallback dance:
//!
//! 1. An explicitly forced engine wins outright, with no fallback.
//! 2. In test mode (without the real-transcription escape hatch) the
//!    deterministic mock engine is used.
//! 3. With an accelerator present and CPU not forced, the accelerated
//!    backend is tried first; any init failure falls back to CPU.
//! 4. Otherwise the CPU backend is used directly.
//!
//! Accelerator availability is captured once at construction, so repeated
//! inits of the same facade always walk the same path.

use crate::config::AppConfig;
use crate::device::DeviceManager;
use crate::error::{EngineError, EngineResult};
use crate::transcription::accelerated::AcceleratedEngine;
use crate::transcription::contract::{EngineCallbacks, EngineType, SpeechEngine};
use crate::transcription::cpu::CpuEngine;
use crate::transcription::mock::MockEngine;
use std::time::Duration;
use tracing::{info, warn};

/// Options controlling engine selection during `init`.
#[derive(Default)]
pub struct InitOptions {
    pub callbacks: EngineCallbacks,
    /// Bypass selection entirely and use exactly this backend.
    pub force_engine: Option<EngineType>,
}

/// Constructs a backend instance for a given discriminant. Injectable so
/// tests can substitute scripted doubles for the real backends.
type EngineFactory = Box<dyn Fn(EngineType) -> EngineResult<Box<dyn SpeechEngine>> + Send + Sync>;

pub struct PrivateStt {
    config: AppConfig,
    accelerator_available: bool,
    factory: EngineFactory,
    engine: Option<Box<dyn SpeechEngine>>,
    engine_type: Option<EngineType>,
    fallback_reason: Option<String>,
}

impl PrivateStt {
    pub fn new(config: AppConfig) -> Self {
        let factory = Self::default_factory(&config);
        let accelerator_available = DeviceManager::accelerator_available();
        Self::with_parts(config, accelerator_available, factory)
    }

    fn with_parts(config: AppConfig, accelerator_available: bool, factory: EngineFactory) -> Self {
        Self {
            config,
            accelerator_available,
            factory,
            engine: None,
            engine_type: None,
            fallback_reason: None,
        }
    }

    fn default_factory(config: &AppConfig) -> EngineFactory {
        let model = config.model.clone();
        Box::new(move |engine_type| {
            let engine: Box<dyn SpeechEngine> = match engine_type {
                EngineType::Accelerated => {
                    let device = DeviceManager::accelerator().ok_or_else(|| {
                        EngineError::Init("No compute accelerator available".to_string())
                    })?;
                    Box::new(AcceleratedEngine::new(model.accelerated_repo.clone(), device))
                }
                EngineType::Cpu => Box::new(CpuEngine::new(model.cpu_repo.clone())),
                EngineType::Mock => Box::new(MockEngine::new()),
            };
            Ok(engine)
        })
    }

    /// Select and initialize a backend. Returns the engine type bound.
    pub async fn init(&mut self, options: InitOptions) -> EngineResult<EngineType> {
        // Re-init replaces any existing binding
        self.destroy().await;
        self.fallback_reason = None;

        let timeout = Duration::from_millis(self.config.model.init_timeout_ms);

        if let Some(forced) = options.force_engine {
            info!("Engine forced to {}, skipping selection", forced);
            let engine = self.try_engine(forced, &options.callbacks, timeout).await?;
            return Ok(self.bind(engine));
        }

        if self.config.flags.use_mock_engine() {
            info!("Test mode active, using mock engine");
            let engine = self
                .try_engine(EngineType::Mock, &options.callbacks, timeout)
                .await?;
            return Ok(self.bind(engine));
        }

        if self.accelerator_available && !self.config.flags.force_cpu {
            info!("Accelerator detected, trying accelerated engine first");
            match self
                .try_engine(EngineType::Accelerated, &options.callbacks, timeout)
                .await
            {
                Ok(engine) => return Ok(self.bind(engine)),
                Err(e) => {
                    warn!("Accelerated engine failed ({}), falling back to CPU", e);
                    self.fallback_reason = Some(e.to_string());
                }
            }
        } else if self.config.flags.force_cpu {
            info!("CPU inference forced by configuration");
        }

        let engine = self
            .try_engine(EngineType::Cpu, &options.callbacks, timeout)
            .await?;
        Ok(self.bind(engine))
    }

    async fn try_engine(
        &self,
        engine_type: EngineType,
        callbacks: &EngineCallbacks,
        timeout: Duration,
    ) -> EngineResult<Box<dyn SpeechEngine>> {
        let mut engine = (self.factory)(engine_type)?;
        engine.init(callbacks, Some(timeout)).await?;
        Ok(engine)
    }

    fn bind(&mut self, engine: Box<dyn SpeechEngine>) -> EngineType {
        let engine_type = engine.engine_type();
        info!("Bound {} engine", engine_type);
        self.engine = Some(engine);
        self.engine_type = Some(engine_type);
        engine_type
    }

    /// Transcribe float samples with the bound backend.
    pub async fn transcribe(&mut self, audio: &[f32]) -> EngineResult<String> {
        let engine = self.engine.as_mut().ok_or(EngineError::NotInitialized)?;
        engine.transcribe(audio).await
    }

    /// Release the bound backend, if any. Idempotent.
    pub async fn destroy(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy().await;
        }
        self.engine_type = None;
    }

    /// The backend currently bound, if initialized.
    pub fn engine_type(&self) -> Option<EngineType> {
        self.engine_type
    }

    /// Why the last init fell back to CPU, if it did.
    pub fn last_fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted backend double that counts init calls and can be told to fail.
    struct ScriptedEngine {
        engine_type: EngineType,
        fail_init: bool,
        init_calls: Arc<AtomicUsize>,
        ready: bool,
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        fn engine_type(&self) -> EngineType {
            self.engine_type
        }

        async fn init(
            &mut self,
            _callbacks: &EngineCallbacks,
            _timeout: Option<Duration>,
        ) -> EngineResult<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(EngineError::Init("scripted failure".to_string()));
            }
            self.ready = true;
            Ok(())
        }

        async fn transcribe(&mut self, _audio: &[f32]) -> EngineResult<String> {
            if !self.ready {
                return Err(EngineError::NotInitialized);
            }
            Ok(format!("transcribed by {}", self.engine_type))
        }

        async fn destroy(&mut self) {
            self.ready = false;
        }
    }

    struct Counters {
        accelerated: Arc<AtomicUsize>,
        cpu: Arc<AtomicUsize>,
        mock: Arc<AtomicUsize>,
    }

    impl Counters {
        fn new() -> Self {
            Self {
                accelerated: Arc::new(AtomicUsize::new(0)),
                cpu: Arc::new(AtomicUsize::new(0)),
                mock: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    fn scripted_factory(counters: &Counters, accelerated_fails: bool) -> EngineFactory {
        let accelerated = counters.accelerated.clone();
        let cpu = counters.cpu.clone();
        let mock = counters.mock.clone();
        Box::new(move |engine_type| {
            let init_calls = match engine_type {
                EngineType::Accelerated => accelerated.clone(),
                EngineType::Cpu => cpu.clone(),
                EngineType::Mock => mock.clone(),
            };
            Ok(Box::new(ScriptedEngine {
                engine_type,
                fail_init: accelerated_fails && engine_type == EngineType::Accelerated,
                init_calls,
                ready: false,
            }))
        })
    }

    fn facade(
        flags: crate::config::TestFlags,
        accelerator_available: bool,
        counters: &Counters,
        accelerated_fails: bool,
    ) -> PrivateStt {
        let mut config = AppConfig::default();
        config.flags = flags;
        PrivateStt::with_parts(
            config,
            accelerator_available,
            scripted_factory(counters, accelerated_fails),
        )
    }

    #[tokio::test]
    async fn test_no_accelerator_goes_straight_to_cpu() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), false, &counters, false);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Cpu);
        assert_eq!(counters.accelerated.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 1);
        assert!(stt.last_fallback_reason().is_none());
    }

    #[tokio::test]
    async fn test_accelerated_failure_falls_back_to_cpu() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), true, &counters, true);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Cpu);
        assert_eq!(counters.accelerated.load(Ordering::SeqCst), 1);
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 1);
        assert!(stt.last_fallback_reason().unwrap().contains("scripted failure"));
    }

    #[tokio::test]
    async fn test_accelerated_success_wins() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), true, &counters, false);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Accelerated);
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 0);
        assert_eq!(
            stt.transcribe(&[0.0]).await.unwrap(),
            "transcribed by accelerated"
        );
    }

    #[tokio::test]
    async fn test_test_mode_selects_mock() {
        let counters = Counters::new();
        let flags = crate::config::TestFlags {
            test_mode: true,
            ..Default::default()
        };
        let mut stt = facade(flags, true, &counters, false);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Mock);
        assert_eq!(counters.accelerated.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 0);
        assert_eq!(counters.mock.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_real_transcription_escape_hatch_skips_mock() {
        let counters = Counters::new();
        let flags = crate::config::TestFlags {
            test_mode: true,
            use_real_transcription: true,
            ..Default::default()
        };
        let mut stt = facade(flags, false, &counters, false);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Cpu);
        assert_eq!(counters.mock.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_cpu_flag_skips_accelerator() {
        let counters = Counters::new();
        let flags = crate::config::TestFlags {
            force_cpu: true,
            ..Default::default()
        };
        let mut stt = facade(flags, true, &counters, false);

        let bound = stt.init(InitOptions::default()).await.unwrap();

        assert_eq!(bound, EngineType::Cpu);
        assert_eq!(counters.accelerated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forced_engine_bypasses_selection() {
        let counters = Counters::new();
        // Test mode would normally select mock; forcing CPU overrides it
        let flags = crate::config::TestFlags {
            test_mode: true,
            ..Default::default()
        };
        let mut stt = facade(flags, true, &counters, false);

        let options = InitOptions {
            force_engine: Some(EngineType::Cpu),
            ..Default::default()
        };
        let bound = stt.init(options).await.unwrap();

        assert_eq!(bound, EngineType::Cpu);
        assert_eq!(counters.accelerated.load(Ordering::SeqCst), 0);
        assert_eq!(counters.mock.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forced_engine_failure_does_not_fall_back() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), true, &counters, true);

        let options = InitOptions {
            force_engine: Some(EngineType::Accelerated),
            ..Default::default()
        };
        let result = stt.init(options).await;

        assert!(result.is_err());
        assert_eq!(counters.cpu.load(Ordering::SeqCst), 0);
        assert!(stt.engine_type().is_none());
    }

    #[tokio::test]
    async fn test_transcribe_without_init_fails() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), false, &counters, false);

        match stt.transcribe(&[0.0; 800]).await {
            Err(EngineError::NotInitialized) => {}
            other => panic!("expected NotInitialized, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_destroy_clears_binding() {
        let counters = Counters::new();
        let mut stt = facade(Default::default(), false, &counters, false);

        stt.init(InitOptions::default()).await.unwrap();
        assert_eq!(stt.engine_type(), Some(EngineType::Cpu));

        stt.destroy().await;
        assert!(stt.engine_type().is_none());
        assert!(matches!(
            stt.transcribe(&[0.0]).await,
            Err(EngineError::NotInitialized)
        ));

        // Idempotent
        stt.destroy().await;
    }
}
