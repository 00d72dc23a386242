//! 수퍼비전 트리 — 취소 가능하고 에러를 집계하는 동시 작업 트리
//!
//! [`Supervisor`]는 tokio 태스크의 부모/자식 계층을 관리합니다.
//! 각 노드는 [`CancellationToken`]을 가지며, 부모 토큰 취소는 모든
//! 자손에게 전파됩니다 (협조적 취소 — 태스크는 토큰을 관찰해야 합니다).
//!
//! # 실패 전파 정책
//! - 일반 자식([`Supervisor::child`])의 태스크 실패는 같은 부모 아래의
//!   형제들을 취소합니다 (fail-fast 그룹).
//! - 격리 자식([`Supervisor::isolated_child`])의 태스크 실패는 자기 자신의
//!   자손만 취소합니다. 에러는 기록되어 [`Supervisor::wait`]로 집계됩니다.
//!
//! 데이터 소스마다 하나의 격리 자식을 사용하면, 소스 하나의 치명적 실패가
//! 나머지 소스를 중단시키지 않으면서도 오케스트레이터가 에러를 수거할 수
//! 있습니다.
//!
//! # 생명주기
//! ```text
//! Created → spawn() → Running → {Succeeded, Failed, Killed}
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LogwardError;

/// dyn-compatible trait에서 사용하는 박싱된 Future 타입
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 수퍼비전 노드의 생명주기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// 생성됨 (아직 태스크 없음)
    Created,
    /// 하나 이상의 태스크가 실행 중
    Running,
    /// 모든 태스크가 에러 없이 종료됨
    Succeeded,
    /// 태스크 실패가 기록됨
    Failed,
    /// 취소 요청으로 종료됨
    Killed,
}

struct NodeInner {
    name: String,
    generation: u64,
    isolated: bool,
    token: CancellationToken,
    parent: Option<Weak<NodeInner>>,
    shared: Mutex<NodeShared>,
}

#[derive(Default)]
struct NodeShared {
    handles: Vec<JoinHandle<()>>,
    children: Vec<Arc<NodeInner>>,
    first_error: Option<LogwardError>,
    spawned: u64,
    finished: u64,
    failed: bool,
    killed: bool,
}

impl NodeInner {
    fn lock(&self) -> MutexGuard<'_, NodeShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 수퍼비전 트리의 한 노드에 대한 핸들
///
/// 클론은 같은 노드를 가리킵니다. 노드당 하나의 루트가 파이프라인 세대를
/// 나타내며, 데이터 소스 태스크는 루트의 격리 자식으로 등록됩니다.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<NodeInner>,
}

impl Supervisor {
    /// 세대 0의 루트 노드를 생성합니다.
    pub fn root(name: impl Into<String>) -> Self {
        Self::root_for_generation(name, 0)
    }

    /// 지정한 파이프라인 세대의 루트 노드를 생성합니다.
    pub fn root_for_generation(name: impl Into<String>, generation: u64) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                name: name.into(),
                generation,
                isolated: true,
                token: CancellationToken::new(),
                parent: None,
                shared: Mutex::new(NodeShared::default()),
            }),
        }
    }

    fn new_child(&self, name: impl Into<String>, isolated: bool) -> Self {
        let child = Arc::new(NodeInner {
            name: name.into(),
            generation: self.inner.generation,
            isolated,
            token: self.inner.token.child_token(),
            parent: Some(Arc::downgrade(&self.inner)),
            shared: Mutex::new(NodeShared::default()),
        });
        self.inner.lock().children.push(Arc::clone(&child));
        Self { inner: child }
    }

    /// fail-fast 자식 노드를 생성합니다.
    ///
    /// 이 노드의 태스크가 실패하면 부모의 서브트리 전체(형제 포함)가
    /// 취소됩니다.
    pub fn child(&self, name: impl Into<String>) -> Self {
        self.new_child(name, false)
    }

    /// 격리 자식 노드를 생성합니다.
    ///
    /// 이 노드의 태스크가 실패해도 형제는 계속 실행됩니다. 에러는 기록되어
    /// 부모의 [`wait`](Self::wait)에서 집계됩니다.
    pub fn isolated_child(&self, name: impl Into<String>) -> Self {
        self.new_child(name, true)
    }

    /// 노드 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 이 노드가 속한 파이프라인 세대 번호를 반환합니다.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// 이 노드의 취소 토큰을 반환합니다.
    ///
    /// 태스크는 이 토큰을 관찰하여 협조적으로 종료해야 합니다.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// 취소가 요청되었는지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// 이 노드 아래에서 태스크를 실행합니다.
    ///
    /// 태스크가 `Err`를 반환하면 노드에 기록되고, 실패 전파 정책에 따라
    /// 취소가 전파됩니다. 반환값은 [`wait`](Self::wait)가 수거합니다.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), LogwardError>> + Send + 'static,
    {
        let node = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = fut.await;
            let failed = result.is_err();
            {
                let mut shared = node.lock();
                shared.finished += 1;
                if let Err(e) = result {
                    shared.failed = true;
                    if shared.first_error.is_none() {
                        shared.first_error = Some(e);
                    }
                }
            }
            if failed {
                if node.isolated {
                    node.token.cancel();
                } else if let Some(parent) = node.parent.as_ref().and_then(Weak::upgrade) {
                    parent.token.cancel();
                } else {
                    node.token.cancel();
                }
            }
        });
        let mut shared = self.inner.lock();
        shared.spawned += 1;
        shared.handles.push(handle);
    }

    /// 이 노드와 모든 자손의 협조적 취소를 요청합니다. 블로킹하지 않습니다.
    pub fn kill(&self) {
        self.inner.lock().killed = true;
        self.inner.token.cancel();
    }

    /// 이 노드와 모든 자손의 태스크가 종료될 때까지 대기합니다.
    ///
    /// 대기 중에 등록된 태스크(비동기 시작 스트리밍 소스)도 수거합니다.
    /// 기록된 에러 중 첫 번째를 반환하며, 에러는 한 번만 수거됩니다.
    pub async fn wait(&self) -> Result<(), LogwardError> {
        loop {
            let handles = take_handles(&self.inner);
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
        match take_first_error(&self.inner) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 현재 생명주기 상태를 계산합니다.
    ///
    /// 부모의 상태는 자손까지 고려합니다: 자손 중 하나라도 실행 중이면
    /// `Running`, 실패가 기록되었으면 `Failed`입니다.
    pub fn state(&self) -> NodeState {
        if has_outstanding(&self.inner) {
            return NodeState::Running;
        }
        if any_failed(&self.inner) {
            return NodeState::Failed;
        }
        let killed = self.inner.lock().killed || self.inner.token.is_cancelled();
        if killed {
            return NodeState::Killed;
        }
        if !any_spawned(&self.inner) {
            return NodeState::Created;
        }
        NodeState::Succeeded
    }
}

fn children_of(node: &NodeInner) -> Vec<Arc<NodeInner>> {
    node.lock().children.clone()
}

fn take_handles(node: &NodeInner) -> Vec<JoinHandle<()>> {
    let mut handles: Vec<JoinHandle<()>> = node.lock().handles.drain(..).collect();
    for child in children_of(node) {
        handles.extend(take_handles(&child));
    }
    handles
}

fn take_first_error(node: &NodeInner) -> Option<LogwardError> {
    if let Some(e) = node.lock().first_error.take() {
        return Some(e);
    }
    for child in children_of(node) {
        if let Some(e) = take_first_error(&child) {
            return Some(e);
        }
    }
    None
}

fn has_outstanding(node: &NodeInner) -> bool {
    {
        let shared = node.lock();
        if shared.finished < shared.spawned {
            return true;
        }
    }
    children_of(node).iter().any(|c| has_outstanding(c))
}

fn any_failed(node: &NodeInner) -> bool {
    if node.lock().failed {
        return true;
    }
    children_of(node).iter().any(|c| any_failed(c))
}

fn any_spawned(node: &NodeInner) -> bool {
    if node.lock().spawned > 0 {
        return true;
    }
    children_of(node).iter().any(|c| any_spawned(c))
}
