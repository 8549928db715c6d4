//! # Shutdown Scenarios
//!
//! Closing a server must never crash a producer or leave a call hanging:
//! every call either completes normally or fails with a shutdown error.

#[cfg(test)]
mod tests {
    use crate::init_tracing;
    use crate::servers::{echo_server, MathServer};
    use gen_server::{GenServerError, ReplyTo, ServerState};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_releases_in_flight_and_blocked_casts() {
        init_tracing();
        let server = echo_server(Duration::from_millis(300)).unwrap();

        // Taken by the dispatch loop, which then sleeps
        let running = server.cast("echo", "foo", ReplyTo::Discard, None).await;
        sleep(Duration::from_millis(50)).await;
        // Fills the single mailbox slot
        let buffered = server.cast("echo", "bar", ReplyTo::Discard, None).await;
        // Blocks on the full mailbox until the close releases it
        let blocked = {
            let server = server.clone();
            tokio::spawn(async move { server.cast("echo", "baz", ReplyTo::Discard, None).await })
        };

        sleep(Duration::from_millis(100)).await;
        server.close().unwrap();

        let blocked = timeout(DEADLINE, blocked)
            .await
            .expect("blocked cast must be released")
            .unwrap();
        assert!(matches!(
            blocked.error(),
            Some(GenServerError::MailboxClosed)
        ));
        assert!(blocked
            .error()
            .map(|err| err.to_string().contains("send on closed mailbox"))
            .unwrap_or(false));

        for call in [&running, &buffered] {
            timeout(DEADLINE, call.done())
                .await
                .expect("in-flight call must be released");
            assert!(matches!(call.error(), Some(GenServerError::Shutdown)));
        }

        timeout(DEADLINE, server.closed())
            .await
            .expect("dispatch loop must exit");
        assert_eq!(server.state(), ServerState::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_racing_casts_never_hangs() {
        init_tracing();
        let server = MathServer::new().unwrap();

        let producers: Vec<_> = (0..8)
            .map(|_| {
                let server = server.clone();
                tokio::spawn(async move {
                    let mut calls = Vec::new();
                    for _ in 0..200 {
                        calls.push(server.add(1).await);
                    }
                    calls
                })
            })
            .collect();

        sleep(Duration::from_millis(1)).await;
        server.close().unwrap();

        let mut succeeded = 0;
        let mut shut_down = 0;
        for producer in producers {
            let calls = timeout(DEADLINE, producer)
                .await
                .expect("producer must not hang")
                .unwrap();
            for call in calls {
                let outcome = timeout(DEADLINE, call.wait())
                    .await
                    .expect("call must complete");
                match outcome {
                    Ok(()) => succeeded += 1,
                    Err(err) if err.is_shutdown() => shut_down += 1,
                    Err(err) => panic!("unexpected error {err}"),
                }
            }
        }
        assert_eq!(succeeded + shut_down, 1600);

        timeout(DEADLINE, server.server().closed())
            .await
            .expect("dispatch loop must exit");
    }

    #[tokio::test]
    async fn test_double_close() {
        init_tracing();
        let server = MathServer::new().unwrap();

        assert!(server.close().is_ok());
        assert!(matches!(server.close(), Err(GenServerError::Shutdown)));
    }

    #[tokio::test]
    async fn test_state_machine() {
        init_tracing();
        let server = MathServer::new().unwrap();
        assert_eq!(server.server().state(), ServerState::Running);
        assert!(server.server().is_running());

        server.close().unwrap();
        assert_ne!(server.server().state(), ServerState::Running);

        timeout(DEADLINE, server.server().closed())
            .await
            .expect("dispatch loop must exit");
        assert_eq!(server.server().state(), ServerState::Closed);
    }

    #[tokio::test]
    async fn test_dropping_every_reference_stops_the_loop() {
        init_tracing();
        let server = MathServer::new().unwrap();
        let observer = server.clone();
        let mut state = server.server().subscribe();
        server.add(1).await.done().await;

        // One clone left keeps the mailbox open
        drop(server);
        assert!(observer.server().is_running());

        // No close: the last reference going away ends the dispatch loop
        drop(observer);
        let closed = timeout(DEADLINE, state.wait_for(|state| *state == ServerState::Closed))
            .await
            .expect("dispatch loop must exit");
        assert!(closed.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_cast_future_releases_call() {
        init_tracing();
        let server = echo_server(Duration::from_millis(200)).unwrap();

        let running = server.cast("echo", 1_u8, ReplyTo::Discard, None).await;
        sleep(Duration::from_millis(20)).await;
        let buffered = server.cast("echo", 2_u8, ReplyTo::Discard, None).await;

        // Gives up while blocked on the full mailbox
        let abandoned = timeout(
            Duration::from_millis(20),
            server.cast("echo", 3_u8, ReplyTo::Discard, None),
        )
        .await;
        assert!(abandoned.is_err());

        let stats = server.stats();
        assert_eq!(stats.registered, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 2);

        for call in [&running, &buffered] {
            timeout(DEADLINE, call.wait())
                .await
                .expect("call must complete")
                .unwrap();
        }
        server.close().unwrap();
    }
}
