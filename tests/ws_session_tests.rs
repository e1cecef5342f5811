use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::{ws, Client};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use uuid::Uuid;

use realtime_sync_service::auth::issue_jwt;
use realtime_sync_service::config::{AppConfig, AuthConfig, Config, RealtimeConfig};
use realtime_sync_service::handlers::websocket::register_routes as register_websocket;
use realtime_sync_service::models::NotificationKind;
use realtime_sync_service::AppState;

const SECRET: &str = "test-secret";

fn test_state() -> AppState {
    AppState::new(Config {
        app: AppConfig {
            env: "test".into(),
            port: 0,
        },
        auth: AuthConfig {
            jwt_secret: SECRET.into(),
        },
        realtime: RealtimeConfig::default(),
    })
}

async fn start_server(state: AppState) -> std::io::Result<(SocketAddr, ServerHandle)> {
    let data = state.clone();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(data.clone()))
            .configure(register_websocket)
    })
    .workers(1)
    .listen(listener)?
    .run();

    let handle = server.handle();
    actix_rt::spawn(server);
    Ok((addr, handle))
}

fn ws_url(addr: SocketAddr, user: Uuid) -> String {
    let token = issue_jwt(user, SECRET, 3600).unwrap();
    format!("http://{addr}/ws?token={token}")
}

async fn wait_for_connection(state: &AppState, user: Uuid) {
    for _ in 0..200 {
        if state.registry.connection_count(user).await == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connection for {user} never registered");
}

#[actix_rt::test]
async fn fanout_reaches_a_connection_only_after_join() {
    let state = test_state();
    let (addr, handle) = start_server(state.clone()).await.unwrap();
    let user = Uuid::new_v4();
    let (_resp, mut connection) = Client::new()
        .ws(ws_url(addr, user))
        .connect()
        .await
        .expect("connect websocket client");

    // Authenticated but not joined: the connection is not registered and
    // a push for this user goes nowhere.
    assert_eq!(state.registry.connection_count(user).await, 0);
    let early = state
        .notifications
        .push(user, NotificationKind::Order, "before join", None)
        .await
        .unwrap();
    state.fanout.notification_created(&early).await;
    assert!(
        tokio::time::timeout(Duration::from_millis(300), connection.next())
            .await
            .is_err(),
        "received a frame before joining"
    );

    connection
        .send(ws::Message::Text(
            json!({ "type": "join", "user_id": user }).to_string().into(),
        ))
        .await
        .unwrap();
    wait_for_connection(&state, user).await;

    let late = state
        .notifications
        .push(user, NotificationKind::Order, "after join", None)
        .await
        .unwrap();
    state.fanout.notification_created(&late).await;

    // Skip heartbeat pings; the next text frame is the push.
    loop {
        match connection.next().await.expect("frame").expect("frame data") {
            ws::Frame::Ping(_) => continue,
            ws::Frame::Text(bytes) => {
                let text = String::from_utf8(bytes.to_vec()).unwrap();
                assert!(text.contains(r#""type":"newNotification""#));
                assert!(text.contains("after join"));
                break;
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    handle.stop(true).await;
}

#[actix_rt::test]
async fn join_with_foreign_identity_is_closed_with_policy() {
    let state = test_state();
    let (addr, handle) = start_server(state.clone()).await.unwrap();
    let user = Uuid::new_v4();
    let (_resp, mut connection) = Client::new()
        .ws(ws_url(addr, user))
        .connect()
        .await
        .expect("connect websocket client");

    // The token proves `user`; claiming someone else must not register.
    connection
        .send(ws::Message::Text(
            json!({ "type": "join", "user_id": Uuid::new_v4() })
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    loop {
        match connection.next().await.expect("frame").expect("frame data") {
            ws::Frame::Ping(_) => continue,
            ws::Frame::Close(reason) => {
                assert_eq!(reason.unwrap().code, ws::CloseCode::Policy);
                break;
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(state.registry.connection_count(user).await, 0);

    handle.stop(true).await;
}

#[actix_rt::test]
async fn upgrade_without_a_valid_token_is_rejected() {
    let state = test_state();
    let (addr, handle) = start_server(state).await.unwrap();

    let err = Client::new()
        .ws(format!("http://{addr}/ws?token=not-a-jwt"))
        .connect()
        .await;
    assert!(err.is_err());

    handle.stop(true).await;
}
