//! Integration Tests over TCP
//!
//! Each test starts a server on an ephemeral port and talks to it the way a
//! memcached client would.

use flashcached::config::{CacheConfig, ServerConfig};
use flashcached::server::Server;
use flashcached::storage::{Cache, ManualClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_test::assert_ok;

// == Helpers ==

const START: i64 = 1_700_000_000;

fn ephemeral(capacity: usize) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cache: CacheConfig::with_capacity(capacity),
    }
}

async fn start(config: ServerConfig) -> (Server, SocketAddr) {
    let mut server = Server::new(config);
    let addr = assert_ok!(server.start().await);
    (server, addr)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = assert_ok!(TcpStream::connect(addr).await);
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    async fn send(&mut self, request: &str) {
        assert_ok!(self.writer.write_all(request.as_bytes()).await);
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line));
        assert_ok!(assert_ok!(read.await));
        line
    }

    /// Sends a request and collects `count` reply lines.
    async fn call(&mut self, request: &str, count: usize) -> Vec<String> {
        self.send(request).await;
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            lines.push(self.line().await);
        }
        lines
    }

    async fn one(&mut self, request: &str) -> String {
        self.call(request, 1).await.remove(0)
    }
}

// == Storage and Retrieval ==

#[tokio::test]
async fn test_set_then_get() {
    let (mut server, addr) = start(ephemeral(1024 * 1024)).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.one("set user:101 7 0 4\r\nAriz\r\n").await, "STORED\r\n");
    assert_eq!(
        client.call("get user:101 missing\r\n", 3).await,
        vec!["VALUE user:101 7 4\r\n", "Ariz\r\n", "END\r\n"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_gets_then_cas() {
    let (mut server, addr) = start(ephemeral(1024 * 1024)).await;
    let mut client = Client::connect(addr).await;

    client.one("set k 0 0 1\r\na\r\n").await;
    let header = client.call("gets k\r\n", 3).await.remove(0);
    let token: u64 = assert_ok!(header.trim_end().rsplit(' ').next().unwrap().parse::<u64>());

    assert_eq!(
        client.one(&format!("cas k 0 0 1 {}\r\nb\r\n", token)).await,
        "STORED\r\n"
    );
    // The token is spent after a successful write
    assert_eq!(
        client.one(&format!("cas k 0 0 1 {}\r\nc\r\n", token)).await,
        "EXISTS\r\n"
    );
    assert_eq!(client.one("cas nope 0 0 1 1\r\nc\r\n").await, "NOT_FOUND\r\n");
    assert_eq!(client.call("get k\r\n", 3).await[1], "b\r\n");

    server.stop().await;
}

#[tokio::test]
async fn test_add_replace_append_prepend() {
    let (mut server, addr) = start(ephemeral(1024 * 1024)).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.one("replace k 0 0 1\r\nx\r\n").await, "NOT_STORED\r\n");
    assert_eq!(client.one("add k 0 0 2\r\nbc\r\n").await, "STORED\r\n");
    assert_eq!(client.one("add k 0 0 1\r\nz\r\n").await, "NOT_STORED\r\n");
    assert_eq!(client.one("append k 0 0 1\r\nd\r\n").await, "STORED\r\n");
    assert_eq!(client.one("prepend k 0 0 1\r\na\r\n").await, "STORED\r\n");
    assert_eq!(
        client.call("get k\r\n", 3).await,
        vec!["VALUE k 0 4\r\n", "abcd\r\n", "END\r\n"]
    );

    server.stop().await;
}

// == Eviction ==

#[tokio::test]
async fn test_least_recently_used_key_is_evicted() {
    let (mut server, addr) = start(ephemeral(64)).await;
    let mut client = Client::connect(addr).await;

    for i in 0..8 {
        let reply = client.one(&format!("set key{} 0 0 8\r\nvalue-0{}\r\n", i, i)).await;
        assert_eq!(reply, "STORED\r\n");
    }
    // Reading key0 makes key1 the oldest
    assert_eq!(client.call("get key0\r\n", 3).await[1], "value-00\r\n");
    assert_eq!(client.one("set key8 0 0 8\r\nvalue-08\r\n").await, "STORED\r\n");

    assert_eq!(client.one("get key1\r\n").await, "END\r\n");
    assert_eq!(client.call("get key0\r\n", 3).await[1], "value-00\r\n");
    assert_eq!(server.cache().used_bytes(), 64);

    server.stop().await;
}

#[tokio::test]
async fn test_value_larger_than_limit() {
    let config = ServerConfig {
        cache: CacheConfig::new(1024, 4),
        ..ephemeral(0)
    };
    let (mut server, addr) = start(config).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(
        client.one("set big 0 0 5\r\nhello\r\n").await,
        "CLIENT_ERROR object too large for cache\r\n"
    );
    // The payload was consumed, so the connection is still in sync
    assert_eq!(client.one("set small 0 0 4\r\nhey!\r\n").await, "STORED\r\n");

    server.stop().await;
}

// == Arithmetic ==

#[tokio::test]
async fn test_incr_decr() {
    let (mut server, addr) = start(ephemeral(1024)).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.one("incr counter 1\r\n").await, "NOT_FOUND\r\n");
    client.one("set counter 0 0 1\r\n5\r\n").await;
    assert_eq!(client.one("incr counter 3\r\n").await, "8\r\n");
    assert_eq!(client.one("decr counter 10\r\n").await, "-2\r\n");
    assert_eq!(
        client.one("incr counter abc\r\n").await,
        "CLIENT_ERROR invalid numeric delta argument\r\n"
    );

    server.stop().await;
}

// == Expiry ==

#[tokio::test]
async fn test_entries_expire_lazily() {
    let clock = Arc::new(ManualClock::new(START));
    let config = ephemeral(1024);
    let cache = Arc::new(Cache::with_clock(config.cache, clock.clone()));
    let mut server = Server::with_cache(config, cache);
    let addr = assert_ok!(server.start().await);
    let mut client = Client::connect(addr).await;

    client.one("set short 0 10 1\r\na\r\n").await;
    client.one(&format!("set absolute 0 {} 1\r\nb\r\n", START + 20)).await;
    client.one("set forever 0 0 1\r\nc\r\n").await;

    clock.advance(10);
    assert_eq!(client.one("get short\r\n").await, "END\r\n");
    assert_eq!(client.call("get absolute\r\n", 3).await[1], "b\r\n");

    assert_eq!(client.one("touch absolute 100\r\n").await, "TOUCHED\r\n");
    clock.advance(50);
    assert_eq!(client.call("get absolute\r\n", 3).await[1], "b\r\n");
    assert_eq!(client.call("get forever\r\n", 3).await[1], "c\r\n");
    assert_eq!(server.cache().len(), 2);

    server.stop().await;
}

// == Connection Behavior ==

#[tokio::test]
async fn test_noreply_suppresses_replies() {
    let (mut server, addr) = start(ephemeral(1024)).await;
    let mut client = Client::connect(addr).await;

    client.send("set a 0 0 1 noreply\r\n1\r\n").await;
    client.send("incr a 4 noreply\r\n").await;
    client.send("delete missing noreply\r\n").await;
    assert_eq!(
        client.call("get a\r\n", 3).await,
        vec!["VALUE a 0 1\r\n", "5\r\n", "END\r\n"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_command_keeps_connection() {
    let (mut server, addr) = start(ephemeral(1024)).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.one("flush_all\r\n").await, "ERROR\r\n");
    assert_eq!(client.one("get\r\n").await, "ERROR\r\n");
    assert_eq!(client.one("delete nope\r\n").await, "NOT_FOUND\r\n");

    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_requests() {
    let (mut server, addr) = start(ephemeral(1024)).await;
    let mut client = Client::connect(addr).await;

    let replies = client
        .call("set a 0 0 1\r\n1\r\nset b 0 0 1\r\n2\r\ndelete a\r\nget a b\r\n", 6)
        .await;
    assert_eq!(
        replies,
        vec!["STORED\r\n", "STORED\r\n", "DELETED\r\n", "VALUE b 0 1\r\n", "2\r\n", "END\r\n"]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_writers_keep_accounting() {
    let (mut server, addr) = start(ephemeral(1024 * 1024)).await;

    let mut tasks = Vec::new();
    for id in 1..=8usize {
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            let value = "x".repeat(id);
            for _ in 0..50 {
                let reply = client
                    .one(&format!("set shared 0 0 {}\r\n{}\r\n", id, value))
                    .await;
                assert_eq!(reply, "STORED\r\n");
            }
        }));
    }
    for task in tasks {
        assert_ok!(task.await);
    }

    let entry = server.cache().get(b"shared").unwrap();
    assert_eq!(server.cache().len(), 1);
    assert_eq!(server.cache().used_bytes(), entry.value.len());

    server.stop().await;
}

#[tokio::test]
async fn test_stop_disconnects_clients() {
    let (mut server, addr) = start(ephemeral(1024)).await;
    let mut client = Client::connect(addr).await;
    assert_eq!(client.one("set k 0 0 1\r\nv\r\n").await, "STORED\r\n");

    assert_ok!(tokio::time::timeout(Duration::from_secs(5), server.stop()).await);

    let mut rest = Vec::new();
    let read = client.reader.read_to_end(&mut rest).await.unwrap_or(0);
    assert_eq!(read, 0);
    assert!(!server.is_online());
}
