//! 전역 에러 훅.
//!
//! 처리되지 않은 panic, 처리되지 않은 비동기 실패(rejection), 콘솔 에러 로그를
//! 가로채 등록된 핸들러 체인으로 전달한다.
//!
//! 단일 콜백 슬롯을 교체하지 않고 등록 순서대로 실행되는 핸들러 목록을 유지한다.
//! 기존 panic hook은 항상 이어서 호출되며, 콘솔 에러 이벤트도 다른 레이어로 계속 흐른다.

use parking_lot::RwLock;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// 진단 로그를 가로채지 않기 위한 target 접두사
const OWN_TARGET_PREFIX: &str = "vipmon";

/// 훅으로 전달되는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    /// 에러 종류 ("Panic", "UnhandledRejection", "ConsoleError")
    pub kind: String,
    pub message: String,
    pub stack: Option<String>,
    /// 프로세스를 종료시키는 에러인지
    pub is_fatal: bool,
}

/// 핸들러 등록 ID (해제용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// 순서가 있는 핸들러 목록
pub struct HandlerChain {
    name: &'static str,
    handlers: RwLock<Vec<(HandlerId, Handler)>>,
    next_id: AtomicU64,
}

impl HandlerChain {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 체인 끝에 핸들러 추가
    pub fn register<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&HookEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// 핸들러 제거. 제거되었으면 `true`
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// 등록 순서대로 모든 핸들러 실행, 실행된 핸들러 수 반환
    ///
    /// 핸들러 하나가 panic해도 나머지는 계속 실행된다.
    pub fn dispatch(&self, event: &HookEvent) -> usize {
        // 락을 잡은 채 핸들러를 호출하지 않는다 (핸들러 내 재등록 허용)
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in &handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                eprintln!("[vipmon] {} 훅 핸들러 panic (무시)", self.name);
            }
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("name", &self.name)
            .field("handlers", &self.len())
            .finish()
    }
}

/// 프로세스 전역 훅 묶음
///
/// 앱 시작 시 하나 만들어 `Arc`로 공유한다.
#[derive(Debug)]
pub struct GlobalHooks {
    /// 처리되지 않은 panic
    pub uncaught: HandlerChain,
    /// 처리되지 않은 비동기 실패
    pub rejection: HandlerChain,
    /// 콘솔 에러 로그
    pub console: HandlerChain,
    panic_hook_installed: AtomicBool,
}

impl GlobalHooks {
    pub fn new() -> Self {
        Self {
            uncaught: HandlerChain::new("uncaught"),
            rejection: HandlerChain::new("rejection"),
            console: HandlerChain::new("console"),
            panic_hook_installed: AtomicBool::new(false),
        }
    }

    /// 처리되지 않은 비동기 실패 보고
    pub fn report_rejection(&self, reason: impl fmt::Display) -> usize {
        self.rejection.dispatch(&HookEvent {
            kind: "UnhandledRejection".to_string(),
            message: reason.to_string(),
            stack: None,
            is_fatal: false,
        })
    }

    /// 콘솔 에러 보고
    pub fn report_console_error(&self, message: impl Into<String>) -> usize {
        self.console.dispatch(&HookEvent {
            kind: "ConsoleError".to_string(),
            message: message.into(),
            stack: None,
            is_fatal: false,
        })
    }

    /// panic hook 설치 여부
    pub fn is_panic_hook_installed(&self) -> bool {
        self.panic_hook_installed.load(Ordering::Acquire)
    }
}

impl Default for GlobalHooks {
    fn default() -> Self {
        Self::new()
    }
}

/// panic hook 설치
///
/// 기존 hook을 보존하고, `uncaught` 체인 실행 후 기존 hook을 호출한다.
/// 같은 `GlobalHooks`에 대해 두 번째 호출은 아무 것도 하지 않고 `false` 반환.
pub fn install_panic_hook(hooks: &Arc<GlobalHooks>) -> bool {
    if hooks.panic_hook_installed.swap(true, Ordering::AcqRel) {
        return false;
    }

    let weak = Arc::downgrade(hooks);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(hooks) = weak.upgrade() {
            let location = info
                .location()
                .map(|l| format!("at {}:{}:{}", l.file(), l.line(), l.column()));
            let backtrace = Backtrace::capture();
            let stack = match (location, backtrace.status()) {
                (Some(loc), BacktraceStatus::Captured) => Some(format!("{loc}\n{backtrace}")),
                (Some(loc), _) => Some(loc),
                (None, BacktraceStatus::Captured) => Some(backtrace.to_string()),
                (None, _) => None,
            };

            hooks.uncaught.dispatch(&HookEvent {
                kind: "Panic".to_string(),
                message: panic_message(info.payload()),
                stack,
                is_fatal: std::thread::current().name() == Some("main"),
            });
        }
        previous(info);
    }));
    true
}

/// panic payload → 메시지
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic (메시지 없음)".to_string()
    }
}

/// 콘솔 에러 가로채기 레이어
///
/// `ERROR` 레벨 이벤트를 `console` 체인으로 전달한다. 이벤트는 다른 레이어에도
/// 그대로 전달되며, `vipmon*` target은 피드백 루프 방지를 위해 무시한다.
pub struct ConsoleErrorLayer {
    hooks: Arc<GlobalHooks>,
}

impl ConsoleErrorLayer {
    pub fn new(hooks: Arc<GlobalHooks>) -> Self {
        Self { hooks }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleErrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() != Level::ERROR || metadata.target().starts_with(OWN_TARGET_PREFIX) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.hooks
            .report_console_error(visitor.finish(metadata.target()));
    }
}

/// 이벤트 필드 → 한 줄 메시지
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self, target: &str) -> String {
        let mut out = format!("[{target}] {}", self.message.unwrap_or_default());
        if !self.fields.is_empty() {
            out.push(' ');
            out.push_str(&self.fields.join(" "));
        }
        out
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}
