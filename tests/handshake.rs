//! Integration tests for complete IKEv2 handshakes.
//!
//! These tests validate the full IKE_SA_INIT + IKE_AUTH flow:
//! - Session pairs wired through in-memory packet queues
//! - Cipher suite variations (AEAD, CBC+HMAC, ChaCha20, Curve25519)
//! - Negotiation and authentication failure handling
//! - Two daemons exchanging datagrams over real UDP sockets

use std::sync::Arc;

use ikesa::config::IkeConfig;
use ikesa::daemon::IkeDaemon;
use ikesa::message::Message;
use ikesa::payload::IdPayload;
use ikesa::proposal::{
    DhTransformId, EncrTransformId, IntegTransformId, PrfTransformId, Proposal, ProtocolId,
    Transform,
};
use ikesa::queue::MemorySink;
use ikesa::sa::IkeSa;
use ikesa::{Error, StateKind};
use tokio::time::{timeout, Duration};

/// Helper to build a config with the default AES-GCM proposal.
fn test_config(fqdn: &str, psk: &[u8]) -> IkeConfig {
    IkeConfig::builder()
        .with_local_fqdn(fqdn)
        .with_psk(psk)
        .build()
        .expect("Failed to build config")
}

/// Helper to create an initiator/responder session pair, each writing
/// to its own in-memory sink.
fn session_pair(
    initiator_config: IkeConfig,
    responder_config: IkeConfig,
) -> (IkeSa, Arc<MemorySink>, IkeSa, Arc<MemorySink>) {
    let initiator_sink = Arc::new(MemorySink::new());
    let responder_sink = Arc::new(MemorySink::new());

    let initiator = IkeSa::new_initiator(
        Arc::new(initiator_config),
        "10.0.0.2:500".parse().unwrap(),
        initiator_sink.clone(),
    );
    let responder = IkeSa::new_responder(
        Arc::new(responder_config),
        "10.0.0.1:500".parse().unwrap(),
        responder_sink.clone(),
    );

    (initiator, initiator_sink, responder, responder_sink)
}

/// Shuttle queued packets between the two sessions until both queues
/// stay empty. Returns the first processing error, if any.
fn run_handshake(
    initiator: &mut IkeSa,
    initiator_sink: &MemorySink,
    responder: &mut IkeSa,
    responder_sink: &MemorySink,
) -> Result<(), Error> {
    for _ in 0..3 {
        for packet in initiator_sink.drain() {
            responder.process_message(Message::from_datagram(&packet.data)?)?;
        }
        for packet in responder_sink.drain() {
            initiator.process_message(Message::from_datagram(&packet.data)?)?;
        }
    }
    Ok(())
}

//
// Test Cases - Cipher Suites
//

/// Test the default AES-GCM suite end to end.
#[test]
fn test_default_suite_establishes() {
    let (mut initiator, i_sink, mut responder, r_sink) = session_pair(
        test_config("initiator.example.net", b"test-psk"),
        test_config("responder.example.net", b"test-psk"),
    );

    initiator.initiate().expect("Failed to initiate");
    run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect("Handshake failed");

    assert_eq!(initiator.state(), StateKind::Established);
    assert_eq!(responder.state(), StateKind::AuthResponded);
    assert!(initiator.is_established());
    assert!(responder.is_established());

    // The responder learned the initiator SPI, the initiator learned
    // the responder SPI, and they agree.
    assert_eq!(initiator.id(), responder.id());
}

/// Test AES-CBC with separate HMAC integrity protection.
#[test]
fn test_cbc_suite_establishes() {
    let proposal = Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesCbc).with_key_length(256))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::integ(IntegTransformId::HmacSha256_128))
        .add_transform(Transform::dh(DhTransformId::Group14));

    let config = |name: &str| {
        IkeConfig::builder()
            .with_local_fqdn(name)
            .with_psk(&b"cbc-psk"[..])
            .with_proposals(vec![proposal.clone()])
            .build()
            .expect("Failed to build config")
    };

    let (mut initiator, i_sink, mut responder, r_sink) =
        session_pair(config("initiator.example.net"), config("responder.example.net"));

    initiator.initiate().expect("Failed to initiate");
    run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect("Handshake failed");

    assert!(initiator.is_established());
    assert!(responder.is_established());
}

/// Test ChaCha20-Poly1305, which carries no key length attribute.
#[test]
fn test_chacha20_suite_establishes() {
    let proposal = Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::ChaCha20Poly1305))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::dh(DhTransformId::Group14));

    let config = |name: &str| {
        IkeConfig::builder()
            .with_local_fqdn(name)
            .with_psk(&b"chacha-psk"[..])
            .with_proposals(vec![proposal.clone()])
            .build()
            .expect("Failed to build config")
    };

    let (mut initiator, i_sink, mut responder, r_sink) =
        session_pair(config("initiator.example.net"), config("responder.example.net"));

    initiator.initiate().expect("Failed to initiate");
    run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect("Handshake failed");

    assert!(initiator.is_established());
    assert!(responder.is_established());
}

/// Test key exchange over Curve25519 instead of MODP-2048.
#[test]
fn test_curve25519_group_establishes() {
    let proposal = Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::dh(DhTransformId::Group31));

    let config = |name: &str| {
        IkeConfig::builder()
            .with_local_fqdn(name)
            .with_psk(&b"x25519-psk"[..])
            .with_proposals(vec![proposal.clone()])
            .build()
            .expect("Failed to build config")
    };

    let (mut initiator, i_sink, mut responder, r_sink) =
        session_pair(config("initiator.example.net"), config("responder.example.net"));

    initiator.initiate().expect("Failed to initiate");
    run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect("Handshake failed");

    assert!(initiator.is_established());
    assert!(responder.is_established());
}

//
// Test Cases - Negotiation
//

/// Test that the responder selects the overlapping proposal when the
/// initiator offers more than the responder accepts.
#[test]
fn test_negotiation_picks_common_proposal() {
    let cbc = Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesCbc).with_key_length(128))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::integ(IntegTransformId::HmacSha256_128))
        .add_transform(Transform::dh(DhTransformId::Group14));
    let gcm = Proposal::new(2, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::dh(DhTransformId::Group14));

    let initiator_config = IkeConfig::builder()
        .with_local_fqdn("initiator.example.net")
        .with_psk(&b"nego-psk"[..])
        .with_proposals(vec![cbc, gcm.clone()])
        .build()
        .expect("Failed to build config");

    // Responder only accepts the GCM suite
    let responder_config = IkeConfig::builder()
        .with_local_fqdn("responder.example.net")
        .with_psk(&b"nego-psk"[..])
        .with_proposals(vec![gcm])
        .build()
        .expect("Failed to build config");

    let (mut initiator, i_sink, mut responder, r_sink) =
        session_pair(initiator_config, responder_config);

    initiator.initiate().expect("Failed to initiate");
    run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect("Handshake failed");

    assert!(initiator.is_established());
    assert!(responder.is_established());
}

/// Test that disjoint proposal sets abort the handshake.
#[test]
fn test_no_common_proposal_fails() {
    let cbc = Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesCbc).with_key_length(128))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::integ(IntegTransformId::HmacSha256_128))
        .add_transform(Transform::dh(DhTransformId::Group14));

    let initiator_config = IkeConfig::builder()
        .with_local_fqdn("initiator.example.net")
        .with_psk(&b"nego-psk"[..])
        .with_proposals(vec![cbc])
        .build()
        .expect("Failed to build config");
    let responder_config = test_config("responder.example.net", b"nego-psk");

    let (mut initiator, i_sink, mut responder, r_sink) =
        session_pair(initiator_config, responder_config);

    initiator.initiate().expect("Failed to initiate");
    let err = run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect_err("Handshake should fail");

    assert!(matches!(err, Error::NegotiationFailed(_)));
    assert_eq!(initiator.state(), StateKind::InitRequested);
    assert!(!responder.is_established());
}

//
// Test Cases - Authentication
//

/// Test that mismatched pre-shared keys fail AUTH verification.
///
/// SKEYSEED depends only on the nonces and the DH secret, so the
/// responder decrypts the IKE_AUTH request fine and rejects it on the
/// AUTH payload.
#[test]
fn test_psk_mismatch_fails_authentication() {
    let (mut initiator, i_sink, mut responder, r_sink) = session_pair(
        test_config("initiator.example.net", b"the right secret"),
        test_config("responder.example.net", b"the wrong secret"),
    );

    initiator.initiate().expect("Failed to initiate");
    let err = run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect_err("Handshake should fail");

    assert!(matches!(err, Error::AuthenticationFailed(_)));
    // The initiator sent IKE_AUTH and never got an answer
    assert_eq!(initiator.state(), StateKind::AuthRequested);
    assert!(!responder.is_established());
}

/// Test that a peer asserting an unexpected identity is rejected.
#[test]
fn test_remote_id_mismatch_rejected() {
    let responder_config = IkeConfig::builder()
        .with_local_fqdn("responder.example.net")
        .with_remote_id(IdPayload::from_fqdn("expected.example.net"))
        .with_psk(&b"id-psk"[..])
        .build()
        .expect("Failed to build config");

    let (mut initiator, i_sink, mut responder, r_sink) = session_pair(
        test_config("initiator.example.net", b"id-psk"),
        responder_config,
    );

    initiator.initiate().expect("Failed to initiate");
    let err = run_handshake(&mut initiator, &i_sink, &mut responder, &r_sink)
        .expect_err("Handshake should fail");

    assert!(matches!(err, Error::AuthenticationFailed(_)));
    assert!(!responder.is_established());
}

//
// Test Cases - Daemon over UDP
//

/// Test two daemons completing a handshake over loopback sockets.
#[tokio::test]
async fn test_daemon_handshake_over_udp() -> Result<(), Box<dyn std::error::Error>> {
    let mut left = IkeDaemon::bind(
        test_config("left.example.net", b"udp-psk"),
        "127.0.0.1:0".parse()?,
    )
    .await?;
    let mut right = IkeDaemon::bind(
        test_config("right.example.net", b"udp-psk"),
        "127.0.0.1:0".parse()?,
    )
    .await?;

    let right_addr = right.local_addr();
    let left_metrics = left.metrics();
    let right_metrics = right.metrics();
    let left_shutdown = left.shutdown_handle();
    let right_shutdown = right.shutdown_handle();

    // Queue the IKE_SA_INIT request before starting the socket loops
    left.initiate(right_addr)?;

    let left_handle = tokio::spawn(async move {
        let result = left.run().await;
        result.map(|_| left)
    });
    let right_handle = tokio::spawn(async move {
        let result = right.run().await;
        result.map(|_| right)
    });

    // Wait for both sides to report an established handshake
    let established = async {
        loop {
            if left_metrics.snapshot().handshakes_completed >= 1
                && right_metrics.snapshot().handshakes_completed >= 1
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    timeout(Duration::from_secs(5), established)
        .await
        .expect("Handshake did not complete in time");

    left_shutdown.notify_one();
    right_shutdown.notify_one();

    let left = timeout(Duration::from_secs(5), left_handle).await???;
    let right = timeout(Duration::from_secs(5), right_handle).await???;

    // Shutdown tears every session down
    assert_eq!(left.session_count(), 0);
    assert_eq!(right.session_count(), 0);

    let left_snapshot = left.metrics().snapshot();
    let right_snapshot = right.metrics().snapshot();
    assert_eq!(left_snapshot.handshakes_completed, 1);
    assert_eq!(right_snapshot.handshakes_completed, 1);
    assert_eq!(left_snapshot.handshakes_failed, 0);
    assert_eq!(right_snapshot.handshakes_failed, 0);
    // Two messages out, two in on each side
    assert_eq!(left_snapshot.messages_sent, 2);
    assert_eq!(right_snapshot.messages_sent, 2);
    assert_eq!(left_snapshot.messages_received, 2);
    assert_eq!(right_snapshot.messages_received, 2);

    Ok(())
}
