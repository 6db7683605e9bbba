use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tks_core::{
    BufferOptions, DualModeEditor, LineMark, SharedEditor, SourceBuffer, lock_editor,
};
use tks_lang::LanguageConfig;
use tks_runner::{
    CancelHandle, DeviceCommander, DeviceError, DispatchResult, EngineOptions, ExecutionContext,
    ExecutionEngine, Notice, PreconditionError, RunError, RunObserver, RunOutcome, RunState,
};
use tokio::sync::Notify;

const SCRIPT: &str = "用例: TC-01
脚本名: 登录
步骤:
    启动 [com.example.app]
    点击 [{100,200}]
    # 账号
    输入 [{用户名}, admin]
    等待 [500]
    返回
";

const STEP_LINES: [usize; 5] = [4, 5, 7, 8, 9];

/// Records every call and answers from a fixed plan.
#[derive(Default)]
struct ScriptedCommander {
    dispatched: Mutex<Vec<String>>,
    refreshes: AtomicUsize,
    /// 1-based dispatch that reports failure.
    fail_at: Option<usize>,
    /// 1-based dispatch that fails at the transport level.
    transport_error_at: Option<usize>,
    /// 1-based dispatch during which cancellation is requested.
    cancel_at: Option<usize>,
    /// 1-based screen refresh during which cancellation is requested.
    cancel_on_refresh: Option<usize>,
    cancel_handle: Mutex<Option<CancelHandle>>,
    failing_refresh: bool,
    /// Editor whose lock state is sampled on every dispatch.
    watched_editor: Mutex<Option<SharedEditor>>,
    locked_during_dispatch: Mutex<Vec<bool>>,
}

impl ScriptedCommander {
    fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceCommander for ScriptedCommander {
    async fn dispatch_command(
        &self,
        device_id: &str,
        project_path: &Path,
        line: &str,
    ) -> Result<DispatchResult, DeviceError> {
        assert_eq!(device_id, "emulator-5554");
        assert_eq!(project_path, Path::new("/projects/demo"));

        let n = {
            let mut dispatched = self.dispatched.lock().unwrap();
            dispatched.push(line.to_string());
            dispatched.len()
        };
        if let Some(editor) = self.watched_editor.lock().unwrap().as_ref() {
            let locked = lock_editor(editor).is_locked();
            self.locked_during_dispatch.lock().unwrap().push(locked);
        }
        if self.cancel_at == Some(n)
            && let Some(handle) = self.cancel_handle.lock().unwrap().as_ref()
        {
            assert!(handle.cancel());
        }
        if self.transport_error_at == Some(n) {
            return Err(DeviceError::Io(std::io::Error::other("connection reset")));
        }
        if self.fail_at == Some(n) {
            return Ok(DispatchResult::failed("元素未找到"));
        }
        Ok(DispatchResult::ok())
    }

    async fn refresh_screen(&self) -> Result<(), DeviceError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_on_refresh == Some(n)
            && let Some(handle) = self.cancel_handle.lock().unwrap().as_ref()
        {
            assert!(handle.cancel());
        }
        if self.failing_refresh {
            return Err(DeviceError::Io(std::io::Error::other("screen unavailable")));
        }
        Ok(())
    }
}

/// Blocks every dispatch until released.
struct GatedCommander {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DeviceCommander for GatedCommander {
    async fn dispatch_command(
        &self,
        _device_id: &str,
        _project_path: &Path,
        _line: &str,
    ) -> Result<DispatchResult, DeviceError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(DispatchResult::ok())
    }
}

#[derive(Default)]
struct RecordingObserver {
    notices: Mutex<Vec<Notice>>,
    started: Mutex<Vec<(usize, usize, usize, String)>>,
    finished: Mutex<Vec<RunOutcome>>,
}

impl RunObserver for RecordingObserver {
    fn step_started(&self, step: usize, total: usize, line_number: usize, text: &str) {
        self.started
            .lock()
            .unwrap()
            .push((step, total, line_number, text.to_string()));
    }

    fn script_finished(&self, outcome: &RunOutcome, _elapsed: Duration) {
        self.finished.lock().unwrap().push(outcome.clone());
    }

    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

fn editor_with(text: &str) -> SharedEditor {
    let buffer = SourceBuffer::new(
        "/projects/demo/cases/login.tks",
        text,
        BufferOptions {
            autosave: false,
            ..Default::default()
        },
    );
    DualModeEditor::new(buffer, Arc::new(LanguageConfig::tks())).into_shared()
}

fn context() -> ExecutionContext {
    ExecutionContext::new("emulator-5554", "/projects/demo")
}

fn fast_options() -> EngineOptions {
    EngineOptions {
        step_pause: Duration::ZERO,
        ..Default::default()
    }
}

fn engine_for(
    commander: Arc<ScriptedCommander>,
    observer: Arc<RecordingObserver>,
) -> ExecutionEngine {
    ExecutionEngine::new(commander, fast_options()).with_observer(observer)
}

#[tokio::test]
async fn test_run_completes_in_order() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander::default());
    *commander.watched_editor.lock().unwrap() = Some(Arc::clone(&editor));
    let observer = Arc::new(RecordingObserver::default());
    let engine = engine_for(Arc::clone(&commander), Arc::clone(&observer));

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { steps: 5 });
    assert_eq!(
        commander.dispatched(),
        vec![
            "启动 [com.example.app]",
            "点击 [{100,200}]",
            "输入 [{用户名}, admin]",
            "等待 [500]",
            "返回",
        ]
    );
    assert_eq!(
        *commander.locked_during_dispatch.lock().unwrap(),
        vec![true; 5]
    );
    // One refresh before each step plus one after the run.
    assert_eq!(commander.refreshes.load(Ordering::SeqCst), 6);

    let lines: Vec<usize> = observer
        .started
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, line, _)| *line)
        .collect();
    assert_eq!(lines, STEP_LINES);
    assert!(matches!(
        observer.notices.lock().unwrap().last(),
        Some(Notice::Success(_))
    ));

    let editor = lock_editor(&editor);
    assert!(!editor.is_locked());
    assert_eq!(editor.current_highlight(), None);
    assert_eq!(engine.state(), RunState::Idle);
}

#[tokio::test]
async fn test_run_stops_at_failing_step() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        fail_at: Some(3),
        ..Default::default()
    });
    let observer = Arc::new(RecordingObserver::default());
    let engine = engine_for(Arc::clone(&commander), Arc::clone(&observer));

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            line_number: 7,
            message: "元素未找到".to_string(),
        }
    );
    assert_eq!(commander.dispatched().len(), 3);
    assert_eq!(
        observer.notices.lock().unwrap().last(),
        Some(&Notice::Error("元素未找到".to_string()))
    );
    assert_eq!(*observer.finished.lock().unwrap(), vec![outcome]);

    let editor = lock_editor(&editor);
    assert_eq!(editor.current_highlight(), Some(LineMark::error(7)));
    assert!(!editor.is_locked());
    assert_eq!(engine.state(), RunState::Idle);
}

#[tokio::test]
async fn test_transport_error_fails_the_step() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        transport_error_at: Some(1),
        ..Default::default()
    });
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );

    let outcome = engine.run(&editor, &context()).await.unwrap();

    match outcome {
        RunOutcome::Failed {
            line_number,
            message,
        } => {
            assert_eq!(line_number, 4);
            assert!(message.contains("connection reset"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(commander.dispatched().len(), 1);
}

#[tokio::test]
async fn test_cancel_between_steps() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        cancel_at: Some(2),
        ..Default::default()
    });
    let observer = Arc::new(RecordingObserver::default());
    let engine = engine_for(Arc::clone(&commander), Arc::clone(&observer));
    *commander.cancel_handle.lock().unwrap() = Some(engine.cancel_handle());

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled { last_line: Some(5) });
    assert_eq!(
        commander.dispatched(),
        vec!["启动 [com.example.app]", "点击 [{100,200}]"]
    );
    assert!(matches!(
        observer.notices.lock().unwrap().last(),
        Some(Notice::Warning(_))
    ));

    let editor = lock_editor(&editor);
    assert!(!editor.is_locked());
    assert_eq!(editor.current_highlight(), Some(LineMark::executing(5)));
    assert_eq!(engine.state(), RunState::Idle);
}

#[tokio::test]
async fn test_cancel_during_refresh_skips_the_next_dispatch() {
    let editor = editor_with("步骤:\n    返回\n    隐藏键盘\n    等待 [500]\n");
    let commander = Arc::new(ScriptedCommander {
        cancel_on_refresh: Some(2),
        ..Default::default()
    });
    let observer = Arc::new(RecordingObserver::default());
    let engine = engine_for(Arc::clone(&commander), Arc::clone(&observer));
    *commander.cancel_handle.lock().unwrap() = Some(engine.cancel_handle());

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled { last_line: Some(2) });
    assert_eq!(commander.dispatched(), vec!["返回"]);
    assert_eq!(observer.started.lock().unwrap().len(), 1);
    assert_eq!(
        lock_editor(&editor).current_highlight(),
        Some(LineMark::executing(2))
    );
    assert!(!lock_editor(&editor).is_locked());
}

#[tokio::test]
async fn test_cancel_during_last_step_is_an_abort() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        cancel_at: Some(5),
        ..Default::default()
    });
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );
    *commander.cancel_handle.lock().unwrap() = Some(engine.cancel_handle());

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled { last_line: Some(9) });
    assert_eq!(commander.dispatched().len(), 5);
}

#[tokio::test]
async fn test_cancel_when_idle_is_refused() {
    let engine = ExecutionEngine::new(Arc::new(ScriptedCommander::default()), fast_options());
    assert!(!engine.cancel());

    // A stale request must not leak into the next run.
    let editor = editor_with(SCRIPT);
    let outcome = engine.run(&editor, &context()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed { steps: 5 });
}

#[tokio::test]
async fn test_refresh_failure_is_ignored() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        failing_refresh: true,
        ..Default::default()
    });
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );

    let outcome = engine.run(&editor, &context()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { steps: 5 });
    assert_eq!(commander.refreshes.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_refresh_can_be_disabled() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander::default());
    let engine = ExecutionEngine::new(
        Arc::clone(&commander) as Arc<dyn DeviceCommander>,
        EngineOptions {
            step_pause: Duration::ZERO,
            refresh_before_step: false,
            refresh_after_run: false,
        },
    );

    engine.run(&editor, &context()).await.unwrap();

    assert_eq!(commander.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_preconditions_reject_without_side_effects() {
    let commander = Arc::new(ScriptedCommander::default());
    let observer = Arc::new(RecordingObserver::default());
    let engine = engine_for(Arc::clone(&commander), Arc::clone(&observer));
    let editor = editor_with(SCRIPT);

    let no_device = ExecutionContext {
        device_id: None,
        project_path: Some("/projects/demo".into()),
    };
    assert_eq!(
        engine.run(&editor, &no_device).await,
        Err(RunError::Precondition(PreconditionError::MissingDevice))
    );

    let no_project = ExecutionContext {
        device_id: Some("emulator-5554".to_string()),
        project_path: None,
    };
    assert_eq!(
        engine.run(&editor, &no_project).await,
        Err(RunError::Precondition(PreconditionError::MissingProject))
    );

    let empty = editor_with("用例: TC-02\n步骤:\n    # 还没有步骤\n");
    assert_eq!(
        engine.run(&empty, &context()).await,
        Err(RunError::Precondition(PreconditionError::NoCommands))
    );

    assert!(commander.dispatched().is_empty());
    assert_eq!(engine.state(), RunState::Idle);
    assert!(!lock_editor(&editor).is_locked());
    assert_eq!(lock_editor(&editor).current_highlight(), None);
    let notices = observer.notices.lock().unwrap();
    assert_eq!(notices.len(), 3);
    assert!(notices.iter().all(|n| matches!(n, Notice::Error(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_run_is_rejected_while_busy() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(GatedCommander {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let engine = ExecutionEngine::new(
        Arc::clone(&commander) as Arc<dyn DeviceCommander>,
        fast_options(),
    );

    let first = tokio::spawn({
        let engine = engine.clone();
        let editor = Arc::clone(&editor);
        async move { engine.run(&editor, &context()).await }
    });
    commander.entered.notified().await;

    assert_eq!(engine.state(), RunState::Running);
    assert!(lock_editor(&editor).is_locked());
    assert_eq!(engine.run(&editor, &context()).await, Err(RunError::Busy));
    assert_eq!(
        engine.run_line(&editor, &context(), 5, "点击 [{1,2}]").await,
        Err(RunError::Busy)
    );

    assert!(engine.cancel());
    commander.release.notify_one();

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled { last_line: Some(4) });
    assert_eq!(engine.state(), RunState::Idle);
    assert!(!lock_editor(&editor).is_locked());
}

#[tokio::test]
async fn test_run_line_success_clears_highlight() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander::default());
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );
    lock_editor(&editor).highlight_error(9);

    let outcome = engine
        .run_line(&editor, &context(), 5, "    点击 [{100,200}]  ")
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed { steps: 1 });
    assert_eq!(commander.dispatched(), vec!["点击 [{100,200}]"]);
    assert_eq!(lock_editor(&editor).current_highlight(), None);
    assert_eq!(commander.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_line_failure_marks_error() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander {
        fail_at: Some(1),
        ..Default::default()
    });
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );

    let outcome = engine
        .run_line(&editor, &context(), 7, "输入 [{用户名}, admin]")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            line_number: 7,
            message: "元素未找到".to_string(),
        }
    );
    let editor = lock_editor(&editor);
    assert_eq!(editor.current_highlight(), Some(LineMark::error(7)));
    assert!(!editor.is_locked());
}

#[tokio::test]
async fn test_run_line_rejects_blank_text() {
    let editor = editor_with(SCRIPT);
    let commander = Arc::new(ScriptedCommander::default());
    let engine = engine_for(
        Arc::clone(&commander),
        Arc::new(RecordingObserver::default()),
    );

    assert_eq!(
        engine.run_line(&editor, &context(), 6, "   ").await,
        Err(RunError::Precondition(PreconditionError::EmptyLine))
    );
    assert!(commander.dispatched().is_empty());
    assert_eq!(engine.state(), RunState::Idle);
}

#[cfg(unix)]
mod process {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tks_runner::{
        DeviceCommander, DeviceError, DispatchResult, ProcessCommander, ProcessCommanderConfig,
    };

    /// `sh -c <script> tke ...` puts the generated arguments in `$1..$7`.
    fn shell(script: &str) -> ProcessCommander {
        ProcessCommander::new(ProcessCommanderConfig {
            program: "sh".into(),
            base_args: vec!["-c".to_string(), script.to_string(), "tke".to_string()],
            refresh_args: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_process_commander_passes_arguments() {
        let commander = shell(
            r#"if [ "$1 $2 $3 $4 $5 $6" = "--project /p --device d1 run step" ] && [ "$7" = "返回" ]; then
  echo '{"success": true}'
else
  echo "{\"success\": false, \"error\": \"unexpected: $*\"}"
fi"#,
        );

        let result = commander
            .dispatch_command("d1", Path::new("/p"), "返回")
            .await
            .unwrap();
        assert_eq!(result, DispatchResult::ok());
    }

    #[tokio::test]
    async fn test_process_commander_reads_failure_json() {
        let commander = shell(
            r#"echo 'warming up' >&2; echo '{"success": false, "error": "超时"}'; exit 1"#,
        );

        let result = commander
            .dispatch_command("d1", Path::new("/p"), "等待 [500]")
            .await
            .unwrap();
        assert_eq!(result, DispatchResult::failed("超时"));
    }

    #[tokio::test]
    async fn test_process_commander_rejects_garbage() {
        let commander = shell("echo not-json");

        let err = commander
            .dispatch_command("d1", Path::new("/p"), "返回")
            .await
            .unwrap_err();
        match err {
            DeviceError::InvalidOutput { stdout, .. } => assert_eq!(stdout.trim(), "not-json"),
            other => panic!("expected invalid output, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_commander_missing_program() {
        let commander = ProcessCommander::new(ProcessCommanderConfig {
            program: "/nonexistent/tke-runner".into(),
            ..Default::default()
        });

        let err = commander
            .dispatch_command("d1", Path::new("/p"), "返回")
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_process_commander_refresh() {
        let ok = ProcessCommander::new(ProcessCommanderConfig {
            program: "sh".into(),
            base_args: vec!["-c".to_string(), "exit 0".to_string()],
            refresh_args: vec!["refresh".to_string()],
        });
        assert!(ok.refresh_screen().await.is_ok());

        let failing = ProcessCommander::new(ProcessCommanderConfig {
            program: "sh".into(),
            base_args: vec!["-c".to_string(), "exit 3".to_string()],
            refresh_args: vec!["refresh".to_string()],
        });
        assert!(failing.refresh_screen().await.is_err());
    }
}
