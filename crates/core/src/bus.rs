//! 이벤트 버스 — 모든 데이터 소스가 공유하는 팬인(fan-in) 채널
//!
//! 각 소스 태스크는 [`EventBus`]의 클론을 통해 이벤트를 발행하고,
//! 하류 소비자(상관분석 단계)는 단일 [`EventBusReader`]로 수신합니다.
//!
//! # 배압(backpressure)
//! 채널은 유계(bounded)이며, 소비자가 느리면 발행 측이 블로킹됩니다.
//! 수집 계층은 버퍼링/드롭 정책을 추가하지 않습니다.
//!
//! # 세대(generation)
//! 버스는 파이프라인 세대 번호를 가집니다. 리로드 시 새 세대는 새 버스를
//! 받으므로, 이전 세대의 이벤트가 새 세대의 소비자에게 전달되지 않습니다.

use tokio::sync::mpsc;

use crate::error::{LogwardError, PipelineError};
use crate::event::Event;
use crate::metrics as m;

/// 버스 발행 측 — 소스 태스크마다 클론하여 사용합니다.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    generation: u64,
}

/// 버스 수신 측 — 세대당 정확히 하나의 소비자가 소유합니다.
#[derive(Debug)]
pub struct EventBusReader {
    rx: mpsc::Receiver<Event>,
    generation: u64,
}

/// 새 이벤트 버스를 생성합니다.
///
/// 모든 발행 측 클론이 드롭된 뒤에야 수신 측의 `recv()`가 `None`을
/// 반환합니다. 리로드 오케스트레이터는 이 성질로 "모든 생산자 종료 후
/// 드레인 완료"를 판정합니다.
pub fn channel(capacity: usize, generation: u64) -> (EventBus, EventBusReader) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventBus { tx, generation },
        EventBusReader { rx, generation },
    )
}

impl EventBus {
    /// 이벤트를 발행합니다. 소비자가 느리면 대기합니다.
    ///
    /// 수신 측이 이미 드롭된 경우 `PipelineError::ChannelSend`를 반환합니다.
    pub async fn publish(&self, event: Event) -> Result<(), LogwardError> {
        let src = event.line.src.clone();
        self.tx
            .send(event)
            .await
            .map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
        metrics::counter!(m::BUS_EVENTS_PUBLISHED_TOTAL, "src" => src).increment(1);
        Ok(())
    }

    /// 이 버스가 속한 파이프라인 세대 번호를 반환합니다.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl EventBusReader {
    /// 다음 이벤트를 수신합니다. 모든 발행 측이 드롭되면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// 이 리더가 속한 파이프라인 세대 번호를 반환합니다.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AcquisitionKind, LogLine};

    fn event(n: usize) -> Event {
        Event::new(
            LogLine::new(format!("line #{n}"), "test:src"),
            AcquisitionKind::LiveStream,
        )
    }

    #[tokio::test]
    async fn publish_then_recv_preserves_order() {
        let (bus, mut reader) = channel(16, 0);
        for n in 0..5 {
            bus.publish(event(n)).await.unwrap();
        }
        for n in 0..5 {
            let ev = reader.recv().await.unwrap();
            assert_eq!(ev.raw_str(), format!("line #{n}"));
        }
    }

    #[tokio::test]
    async fn recv_returns_none_after_all_senders_dropped() {
        let (bus, mut reader) = channel(4, 1);
        let clone = bus.clone();
        clone.publish(event(0)).await.unwrap();
        drop(bus);
        drop(clone);

        assert!(reader.recv().await.is_some());
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_fails_when_reader_dropped() {
        let (bus, reader) = channel(4, 0);
        drop(reader);
        let err = bus.publish(event(0)).await.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }

    #[tokio::test]
    async fn generation_is_stamped_on_both_halves() {
        let (bus, reader) = channel(4, 7);
        assert_eq!(bus.generation(), 7);
        assert_eq!(reader.generation(), 7);
    }

    #[tokio::test]
    async fn bounded_channel_applies_backpressure() {
        let (bus, mut reader) = channel(1, 0);
        bus.publish(event(0)).await.unwrap();

        // 용량이 찬 상태의 두 번째 발행은 소비 전까지 완료되지 않습니다.
        let pending = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish(event(1)).await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert!(reader.recv().await.is_some());
        pending.await.unwrap().unwrap();
        assert!(reader.recv().await.is_some());
    }
}
