//! End-to-end tests against scripted loopback servers.
//!
//! Each mock accepts one connection on 127.0.0.1:0, greets, then follows
//! a script of expected commands and canned replies, so every test
//! exercises the real client code path over real sockets.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rax_fxp_client::client::{
    ChannelOptions, ControlChannel, Credentials, EncryptionMode, SessionState, SiteAddress,
};
use rax_fxp_client::error::ClientError;
use rax_fxp_client::{listing, transfer};

/// One scripted exchange on the mock's control connection.
enum Step {
    /// Read one command line; it must start with the prefix; then send
    /// the reply verbatim.
    Expect(&'static str, &'static str),
    /// Send a reply without waiting for a command (the second reply of a
    /// RETR/STOR pair). Pauses briefly first so the client sees it as a
    /// separate segment.
    Send(&'static str),
    /// Go quiet while keeping the connection open.
    Pause(Duration),
}

use Step::{Expect, Pause, Send};

/// Spawn a mock server; returns its address and a handle that fails the
/// test if the script was violated.
async fn mock_server(greeting: &'static str, script: Vec<Step>) -> (SiteAddress, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);
        reader.get_mut().write_all(greeting.as_bytes()).await.unwrap();
        let mut line = String::new();
        for step in script {
            match step {
                Expect(prefix, reply) => {
                    line.clear();
                    let n = reader.read_line(&mut line).await.unwrap();
                    assert!(
                        n > 0,
                        "client closed before sending a command starting with {:?}",
                        prefix
                    );
                    assert!(
                        line.trim_end().starts_with(prefix),
                        "expected command starting with {:?}, got {:?}",
                        prefix,
                        line
                    );
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                }
                Send(reply) => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                }
                Pause(duration) => tokio::time::sleep(duration).await,
            }
        }
    });
    (SiteAddress::new("127.0.0.1", addr.port()), handle)
}

fn plain_channel(site: SiteAddress) -> ControlChannel {
    let options = ChannelOptions {
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        ..ChannelOptions::default()
    };
    ControlChannel::with_options(
        site,
        Credentials::new("user", "secret"),
        EncryptionMode::Plain,
        options,
    )
}

fn login_steps() -> Vec<Step> {
    vec![
        Expect("USER user", "331 Password required\r\n"),
        Expect("PASS secret", "230 Login successful\r\n"),
    ]
}

#[tokio::test]
async fn connect_runs_greeting_and_login() {
    let (site, server) = mock_server("220 Welcome to RAX FXP\r\n", login_steps()).await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();

    assert_eq!(channel.state(), SessionState::Authenticated);
    assert!(!channel.is_secure());
    server.await.unwrap();
}

#[tokio::test]
async fn multi_line_greeting_frames_as_one_reply() {
    let (site, server) = mock_server(
        "220-Welcome\r\n220-Mirrors available\r\n220 Ready\r\n",
        login_steps(),
    )
    .await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();

    assert_eq!(channel.state(), SessionState::Authenticated);
    server.await.unwrap();
}

#[tokio::test]
async fn non_220_greeting_fails_the_greeting_step() {
    let (site, _server) = mock_server("500 Go away\r\n", vec![]).await;
    let mut channel = plain_channel(site);

    match channel.connect().await.unwrap_err() {
        ClientError::Protocol {
            step,
            expected,
            actual,
        } => {
            assert_eq!(step, "greeting");
            assert_eq!(expected, 220);
            assert_eq!(actual, 500);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn rejected_password_fails_the_password_step() {
    let script = vec![
        Expect("USER user", "331 Password required\r\n"),
        Expect("PASS secret", "530 Login incorrect\r\n"),
    ];
    let (site, server) = mock_server("220 Welcome\r\n", script).await;
    let mut channel = plain_channel(site);

    match channel.connect().await.unwrap_err() {
        ClientError::Protocol { step, actual, .. } => {
            assert_eq!(step, "password");
            assert_eq!(actual, 530);
        }
        other => panic!("unexpected error: {}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn close_sends_quit_and_releases_the_channel() {
    let mut script = login_steps();
    script.push(Expect("QUIT", "221 Goodbye\r\n"));
    let (site, server) = mock_server("220 Welcome\r\n", script).await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();
    channel.close().await;

    assert_eq!(channel.state(), SessionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn server_going_silent_trips_the_read_deadline() {
    let (site, _server) = mock_server(
        "220 Welcome\r\n",
        vec![Pause(Duration::from_secs(30))],
    )
    .await;
    let options = ChannelOptions {
        read_timeout: Duration::from_millis(300),
        ..ChannelOptions::default()
    };
    let mut channel = ControlChannel::with_options(
        site,
        Credentials::new("user", "secret"),
        EncryptionMode::Plain,
        options,
    );

    match channel.connect().await.unwrap_err() {
        ClientError::Timeout { operation, .. } => assert_eq!(operation, "receive"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn unexpected_close_surfaces_as_connection_failure() {
    // Script ends right after the greeting, dropping the socket.
    let (site, server) = mock_server("220 Welcome\r\n", vec![]).await;
    let mut channel = plain_channel(site);

    let err = channel.connect().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::ConnectionClosed(_) | ClientError::Connection(_)
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn listing_parses_entries_from_a_213_reply() {
    let mut script = login_steps();
    script.push(Expect(
        "stat -l",
        "213-Status of .:\r\n\
         total 12\r\n\
         drwxr-xr-x 2 user group 4096 Jan 1 12:00 incoming\r\n\
         -rw-r--r-- 1 user group 512 Feb 2 2024 read me.txt\r\n\
         213 End of status\r\n",
    ));
    let (site, server) = mock_server("220 Welcome\r\n", script).await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();
    let entries = listing::list(&mut channel).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "incoming");
    assert_eq!(entries[0].size, 4096);
    assert_eq!(entries[1].name, "read me.txt");
    assert_eq!(entries[1].owner, "user");
    server.await.unwrap();
}

#[tokio::test]
async fn passive_negotiation_caches_the_token() {
    let mut script = login_steps();
    script.push(Expect(
        "PASV",
        "227 Entering Passive Mode (127,0,0,1,200,13).\r\n",
    ));
    let (site, server) = mock_server("220 Welcome\r\n", script).await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();
    let token = transfer::enter_passive(&mut channel, false).await.unwrap();

    assert_eq!(token, "127,0,0,1,200,13");
    assert_eq!(channel.passive_token(), Some("127,0,0,1,200,13"));
    server.await.unwrap();
}

#[tokio::test]
async fn fxp_runs_the_full_nine_step_sequence() {
    let mut source_script = login_steps();
    source_script.extend([
        Expect("PASV", "227 Entering Passive Mode (127,0,0,1,200,13).\r\n"),
        Expect("CWD /pub/src", "250 Directory changed\r\n"),
        Expect("RETR file.bin", "150 Opening data connection\r\n"),
        Send("226 Transfer complete\r\n"),
    ]);
    let mut dest_script = login_steps();
    dest_script.extend([
        Expect("PORT 127,0,0,1,200,13", "200 PORT command successful\r\n"),
        Expect("CWD /pub/dst", "250 Directory changed\r\n"),
        Expect("STOR file.bin", "150 Ready to receive\r\n"),
        Send("226 Transfer complete\r\n"),
    ]);
    let (source_site, source_server) = mock_server("220 Source ready\r\n", source_script).await;
    let (dest_site, dest_server) = mock_server("220 Destination ready\r\n", dest_script).await;

    let mut source = plain_channel(source_site);
    let mut destination = plain_channel(dest_site);
    source.connect().await.unwrap();
    destination.connect().await.unwrap();

    let outcome = transfer::transfer(
        &mut source,
        &mut destination,
        "/pub/src",
        "/pub/dst",
        "file.bin",
        1_000_000,
        false,
    )
    .await
    .unwrap();

    // Loopback finishes inside the first second; the divisor clamps to 1.
    assert_eq!(outcome.elapsed_secs, 0);
    assert_eq!(outcome.bytes_per_second, 1_000_000);
    assert_eq!(source.passive_token(), Some("127,0,0,1,200,13"));

    source_server.await.unwrap();
    dest_server.await.unwrap();
}

#[tokio::test]
async fn rejected_port_aborts_before_any_later_step() {
    // After the failed PORT the very next command on either channel must
    // be the shutdown QUIT; the mocks fail on anything else.
    let mut source_script = login_steps();
    source_script.extend([
        Expect("PASV", "227 Entering Passive Mode (127,0,0,1,10,2).\r\n"),
        Expect("QUIT", "221 Goodbye\r\n"),
    ]);
    let mut dest_script = login_steps();
    dest_script.extend([
        Expect("PORT", "500 Syntax error\r\n"),
        Expect("QUIT", "221 Goodbye\r\n"),
    ]);
    let (source_site, source_server) = mock_server("220 Source ready\r\n", source_script).await;
    let (dest_site, dest_server) = mock_server("220 Destination ready\r\n", dest_script).await;

    let mut source = plain_channel(source_site);
    let mut destination = plain_channel(dest_site);
    source.connect().await.unwrap();
    destination.connect().await.unwrap();

    let err = transfer::transfer(
        &mut source,
        &mut destination,
        "/src",
        "/dst",
        "file.bin",
        1_000,
        false,
    )
    .await
    .unwrap_err();

    match err {
        ClientError::Protocol {
            step,
            expected,
            actual,
        } => {
            assert_eq!(step, "port-ack");
            assert_eq!(expected, 200);
            assert_eq!(actual, 500);
        }
        other => panic!("unexpected error: {}", other),
    }

    source.close().await;
    destination.close().await;
    source_server.await.unwrap();
    dest_server.await.unwrap();
}

#[tokio::test]
async fn change_directory_failure_reports_the_cwd_step() {
    let mut script = login_steps();
    script.push(Expect("CWD /missing", "550 No such directory\r\n"));
    let (site, server) = mock_server("220 Welcome\r\n", script).await;
    let mut channel = plain_channel(site);

    channel.connect().await.unwrap();
    match channel.change_directory("/missing").await.unwrap_err() {
        ClientError::Protocol { step, actual, .. } => {
            assert_eq!(step, "cwd");
            assert_eq!(actual, 550);
        }
        other => panic!("unexpected error: {}", other),
    }
    server.await.unwrap();
}
