// SPDX-License-Identifier: MIT

use super::*;
use crate::alert::RouterConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use sw_adapters::{FakeChatTransport, FakeMcApi};
use sw_core::FakeClock;

fn router(
    chat: Arc<FakeChatTransport>,
    mc: Arc<FakeMcApi>,
) -> Arc<AlertRouter<FakeClock>> {
    AlertRouter::new(
        chat,
        mc,
        FakeClock::new(),
        RouterConfig {
            agent_id: "id".into(),
            agent_name: "NEXUS".into(),
            group_chat_id: "group".into(),
            operator_chat_id: "operator".into(),
            cooldown: Duration::from_secs(600),
            batch_flush: Duration::from_secs(1800),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn panicking_task_is_alerted_and_restarted() {
    let chat = Arc::new(FakeChatTransport::new());
    let mc = Arc::new(FakeMcApi::new());
    let router = router(chat.clone(), mc.clone());
    let runs = Arc::new(AtomicU32::new(0));
    let cancel = CancellationToken::new();

    let runs_in_task = runs.clone();
    let handle = spawn_supervised("probe-loop", "NEXUS".into(), router, cancel.clone(), move |token| {
        let runs = runs_in_task.clone();
        async move {
            let run = runs.fetch_add(1, Ordering::SeqCst);
            if run == 0 {
                panic!("boom");
            }
            // Second run stays healthy until cancelled.
            token.cancelled().await;
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // The panic produced exactly one critical alert.
    let operator = chat.sent_to("operator");
    assert_eq!(operator.len(), 1);
    assert!(operator[0].contains("probe-loop"));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn clean_return_ends_supervision() {
    let chat = Arc::new(FakeChatTransport::new());
    let mc = Arc::new(FakeMcApi::new());
    let router = router(chat.clone(), mc.clone());
    let cancel = CancellationToken::new();

    let handle =
        spawn_supervised("one-shot", "NEXUS".into(), router, cancel, |_token| async {});
    handle.await.unwrap();
    assert!(chat.sent().is_empty());
}
