//! IKE SA session plumbing
//!
//! [`SessionCore`] owns everything about one IKE SA that outlives a single
//! state: the SPI pair, negotiated transforms, derived key material, the
//! per-direction crypters and signers, message ID allocation and the
//! request/response bookkeeping that retransmission and AUTH octet
//! construction depend on.
//!
//! [`IkeSa`] pairs a core with the current [`SaState`] and drives the
//! state machine: it validates that an inbound message belongs to this
//! SA, answers retransmitted requests from the recorded response without
//! touching the states, and installs the successor state a handler
//! returns. A handler error leaves the installed state untouched; the
//! caller decides whether the session survives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk::Chunk;
use crate::config::IkeConfig;
use crate::constants::{ExchangeType, IkeFlags, PayloadType};
use crate::crypto::{Crypter, KeyMaterial, Signer, TransformSet};
use crate::error::{Error, Result};
use crate::logging;
use crate::message::{IkeHeader, Message};
use crate::proposal::Proposal;
use crate::queue::{OutboundPacket, PacketSink};
use crate::sa::id::{IkeSaId, Role};
use crate::sa::state::{IdleState, InitRequestedState, SaState, StateKind};

/// Long-lived half of an IKE SA session.
///
/// State handlers borrow the core mutably while processing one message;
/// everything they negotiate or derive is stored here so the successor
/// state finds it in place.
pub struct SessionCore {
    id: IkeSaId,
    role: Role,
    peer: SocketAddr,
    config: Arc<IkeConfig>,
    sink: Arc<dyn PacketSink>,
    transforms: Option<TransformSet>,
    keys: Option<KeyMaterial>,
    crypter_out: Option<Crypter>,
    crypter_in: Option<Crypter>,
    signer_out: Option<Signer>,
    signer_in: Option<Signer>,
    last_requested_message: Option<Message>,
    last_responded_message: Option<Message>,
    next_message_id: u32,
    created_at: Instant,
}

impl SessionCore {
    /// Create a core for a fresh session
    pub fn new(
        role: Role,
        id: IkeSaId,
        peer: SocketAddr,
        config: Arc<IkeConfig>,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        SessionCore {
            id,
            role,
            peer,
            config,
            sink,
            transforms: None,
            keys: None,
            crypter_out: None,
            crypter_in: None,
            signer_out: None,
            signer_in: None,
            last_requested_message: None,
            last_responded_message: None,
            next_message_id: 0,
            created_at: Instant::now(),
        }
    }

    /// SPI pair of this SA
    pub fn id(&self) -> &IkeSaId {
        &self.id
    }

    /// Which side of the handshake we play
    pub fn role(&self) -> Role {
        self.role
    }

    /// Peer address packets are sent to
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Session configuration
    pub fn config(&self) -> &IkeConfig {
        &self.config
    }

    /// Time since the session object was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Record the initiator SPI learned from a peer's first request
    pub fn set_initiator_spi(&mut self, spi: [u8; 8]) {
        self.id.initiator_spi = spi;
    }

    /// Record the responder SPI learned from the peer's first reply
    pub fn set_responder_spi(&mut self, spi: [u8; 8]) {
        self.id.responder_spi = spi;
    }

    /// The negotiated transform set, once an SA payload has been accepted
    pub fn transforms(&self) -> Option<TransformSet> {
        self.transforms
    }

    /// Derived key material, once secrets have been computed
    pub fn keys(&self) -> Option<&KeyMaterial> {
        self.keys.as_ref()
    }

    /// Crypter for messages we send, once keys are installed
    pub fn outbound_crypter(&self) -> Option<&Crypter> {
        self.crypter_out.as_ref()
    }

    /// Crypter for messages we receive
    pub fn inbound_crypter(&self) -> Option<&Crypter> {
        self.crypter_in.as_ref()
    }

    /// Signer for messages we send (`None` for AEAD suites)
    pub fn outbound_signer(&self) -> Option<&Signer> {
        self.signer_out.as_ref()
    }

    /// Signer for messages we receive (`None` for AEAD suites)
    pub fn inbound_signer(&self) -> Option<&Signer> {
        self.signer_in.as_ref()
    }

    /// Accept a negotiated proposal and record its transform set
    ///
    /// # Errors
    ///
    /// Returns an error if the proposal is incoherent, for example an
    /// AEAD cipher combined with a separate integrity transform.
    pub fn create_transforms_from_proposal(&mut self, proposal: &Proposal) -> Result<()> {
        self.transforms = Some(TransformSet::from_proposal(proposal)?);
        Ok(())
    }

    /// Derive key material and install the per-direction crypters and
    /// signers.
    ///
    /// Nonces are passed as sent/received; the mapping onto Ni and Nr
    /// follows from the session role, as does which of SK_e(i|r) keys
    /// the outbound direction uses.
    ///
    /// # Arguments
    ///
    /// * `shared_secret` - DH shared secret g^ir
    /// * `sent_nonce` - the nonce this side generated
    /// * `received_nonce` - the nonce the peer sent
    pub fn compute_secrets(
        &mut self,
        shared_secret: &Chunk,
        sent_nonce: &Chunk,
        received_nonce: &Chunk,
    ) -> Result<()> {
        let transforms = self
            .transforms
            .ok_or_else(|| Error::Internal("key derivation before SA negotiation".into()))?;

        let (nonce_i, nonce_r) = match self.role {
            Role::Initiator => (sent_nonce, received_nonce),
            Role::Responder => (received_nonce, sent_nonce),
        };

        // SK_e sizing covers the AEAD nonce salt, not just the key
        let keys = KeyMaterial::derive(
            transforms.prf,
            nonce_i.as_slice(),
            nonce_r.as_slice(),
            shared_secret.as_slice(),
            &self.id.initiator_spi,
            &self.id.responder_spi,
            transforms.encr.keymat_len(),
            transforms.integ_key_len(),
        )?;

        // SK_ei protects initiator-to-responder traffic, SK_er the
        // reverse; pick by role.
        let (enc_out, enc_in) = match self.role {
            Role::Initiator => (&keys.sk_ei, &keys.sk_er),
            Role::Responder => (&keys.sk_er, &keys.sk_ei),
        };
        self.crypter_out = Some(Crypter::new(transforms.encr, enc_out.clone())?);
        self.crypter_in = Some(Crypter::new(transforms.encr, enc_in.clone())?);

        if let Some(integ) = transforms.integ {
            let (sig_out, sig_in) = match self.role {
                Role::Initiator => (&keys.sk_ai, &keys.sk_ar),
                Role::Responder => (&keys.sk_ar, &keys.sk_ai),
            };
            self.signer_out = Some(Signer::new(integ, sig_out.clone())?);
            self.signer_in = Some(Signer::new(integ, sig_in.clone())?);
        } else {
            self.signer_out = None;
            self.signer_in = None;
        }

        self.keys = Some(keys);
        Ok(())
    }

    /// Start an outgoing request, allocating the next message ID
    pub fn build_request(&mut self, exchange_type: ExchangeType) -> Message {
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let header = IkeHeader::new(
            self.id.initiator_spi,
            self.id.responder_spi,
            PayloadType::None,
            exchange_type,
            IkeFlags::request(self.role.is_initiator()),
            message_id,
            0,
        );
        Message::new(header)
    }

    /// Start a response echoing the request's message ID
    pub fn build_response(&self, exchange_type: ExchangeType, message_id: u32) -> Message {
        let header = IkeHeader::new(
            self.id.initiator_spi,
            self.id.responder_spi,
            PayloadType::None,
            exchange_type,
            IkeFlags::response(self.role.is_initiator()),
            message_id,
            0,
        );
        Message::new(header)
    }

    /// Record the outstanding request for response matching and AUTH
    /// octet construction.
    ///
    /// # Errors
    ///
    /// Returns `BookkeepingFailed` if the message is flagged as a
    /// response or was never serialized.
    pub fn set_last_requested_message(&mut self, message: Message) -> Result<()> {
        if message.header.flags.is_response() {
            return Err(Error::BookkeepingFailed(
                "a response cannot be recorded as the outstanding request".into(),
            ));
        }
        if message.raw().is_none() {
            return Err(Error::BookkeepingFailed(
                "request was never serialized, nothing to record".into(),
            ));
        }
        self.last_requested_message = Some(message);
        Ok(())
    }

    /// Record the last generated response for retransmission
    ///
    /// # Errors
    ///
    /// Returns `BookkeepingFailed` if the message is flagged as a
    /// request or was never serialized.
    pub fn set_last_responded_message(&mut self, message: Message) -> Result<()> {
        if message.header.flags.is_request() {
            return Err(Error::BookkeepingFailed(
                "a request cannot be recorded as the last response".into(),
            ));
        }
        if message.raw().is_none() {
            return Err(Error::BookkeepingFailed(
                "response was never serialized, nothing to record".into(),
            ));
        }
        self.last_responded_message = Some(message);
        Ok(())
    }

    /// The request we are waiting on a response for
    pub fn last_requested_message(&self) -> Option<&Message> {
        self.last_requested_message.as_ref()
    }

    /// The response recorded for retransmission
    pub fn last_responded_message(&self) -> Option<&Message> {
        self.last_responded_message.as_ref()
    }

    /// Message ID the next inbound response must carry
    pub fn expected_response_id(&self) -> Option<u32> {
        self.last_requested_message
            .as_ref()
            .map(|m| m.header.message_id)
    }

    /// Hand a serialized message to the outbound queue
    pub fn enqueue(&self, exchange_type: ExchangeType, data: Vec<u8>) {
        logging::log_message_send(&exchange_type.to_string(), &self.peer.to_string(), data.len());
        self.sink.add(OutboundPacket::new(self.peer, data));
    }
}

/// How [`IkeSa::process_message`] disposed of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The current state handled the message.
    Dispatched,
    /// A retransmitted request was answered from the recorded response.
    Retransmission,
}

/// One IKE SA: session core plus the current negotiation state.
pub struct IkeSa {
    core: SessionCore,
    state: SaState,
}

impl IkeSa {
    /// Create a session that will initiate the handshake
    pub fn new_initiator(
        config: Arc<IkeConfig>,
        peer: SocketAddr,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        let id = IkeSaId::new(IkeSaId::generate_spi(), [0u8; 8]);
        IkeSa {
            core: SessionCore::new(Role::Initiator, id, peer, config, sink),
            state: SaState::Idle(IdleState),
        }
    }

    /// Create a session answering a peer's IKE_SA_INIT request
    ///
    /// The initiator SPI is learned from the first message; our
    /// responder SPI is chosen here.
    pub fn new_responder(
        config: Arc<IkeConfig>,
        peer: SocketAddr,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        let id = IkeSaId::new([0u8; 8], IkeSaId::generate_spi());
        logging::log_handshake_start(&peer.to_string(), Role::Responder.as_str());
        IkeSa {
            core: SessionCore::new(Role::Responder, id, peer, config, sink),
            state: SaState::Idle(IdleState),
        }
    }

    /// SPI pair of this SA
    pub fn id(&self) -> &IkeSaId {
        self.core.id()
    }

    /// Which side of the handshake we play
    pub fn role(&self) -> Role {
        self.core.role()
    }

    /// Peer address of this session
    pub fn peer(&self) -> SocketAddr {
        self.core.peer()
    }

    /// Current state of the negotiation
    pub fn state(&self) -> StateKind {
        self.state.kind()
    }

    /// Whether the handshake has completed on this side
    pub fn is_established(&self) -> bool {
        self.state.kind().is_established()
    }

    /// Start the handshake: build, send and record the IKE_SA_INIT
    /// request, then move to `IKE_SA_INIT_REQUESTED`.
    ///
    /// # Errors
    ///
    /// Fails on a responder session or when called twice. On error the
    /// session stays in its current state.
    pub fn initiate(&mut self) -> Result<()> {
        // Validate state
        if self.core.role() != Role::Initiator {
            return Err(Error::ProtocolMismatch(
                "only the initiator side can start a handshake".into(),
            ));
        }
        if self.state.kind() != StateKind::Idle {
            return Err(Error::ProtocolMismatch(format!(
                "cannot start a handshake in state {}",
                self.state.kind()
            )));
        }

        let next = InitRequestedState::initiate(&mut self.core)?;

        logging::log_handshake_start(
            &self.core.peer().to_string(),
            self.core.role().as_str(),
        );
        logging::log_state_transition(
            &self.core.id().initiator_spi,
            &self.core.id().responder_spi,
            StateKind::Idle.as_str(),
            StateKind::InitRequested.as_str(),
        );
        self.state = SaState::InitRequested(next);
        Ok(())
    }

    /// Feed one received message through the state machine.
    ///
    /// Retransmitted requests are answered from the recorded response
    /// without dispatching to the current state; the returned
    /// [`ProcessOutcome`] tells the two cases apart. Otherwise the
    /// state processes the message; on success its successor (if any)
    /// is installed, on failure the session state is left unchanged
    /// and the error is returned for the caller to act on.
    ///
    /// # Arguments
    ///
    /// * `message` - message with a parsed header, body not yet parsed
    pub fn process_message(&mut self, mut message: Message) -> Result<ProcessOutcome> {
        logging::log_message_recv(
            &message.header.exchange_type.to_string(),
            &self.core.peer().to_string(),
            message.header.length as usize,
        );

        // A message for another SA must not touch this session
        let ours = self.core.id().initiator_spi;
        if ours != [0u8; 8] && message.header.initiator_spi != ours {
            return Err(Error::ProtocolMismatch(
                "initiator SPI does not belong to this session".into(),
            ));
        }

        // Retransmitted request: replay the recorded response verbatim
        if message.header.flags.is_request() {
            if let Some(last) = self.core.last_responded_message() {
                if last.header.message_id == message.header.message_id {
                    let exchange_type = last.header.exchange_type;
                    let raw = last
                        .raw()
                        .map(|r| r.to_vec())
                        .ok_or_else(|| Error::Internal("recorded response has no wire image".into()))?;
                    logging::log_retransmission(&ours, message.header.message_id);
                    self.core.enqueue(exchange_type, raw);
                    return Ok(ProcessOutcome::Retransmission);
                }
            }
        }

        let previous = self.state.kind();
        let next = self.state.process(&mut self.core, &mut message)?;

        if let Some(next) = next {
            let entered = next.kind();
            self.state = next;
            logging::log_state_transition(
                &self.core.id().initiator_spi,
                &self.core.id().responder_spi,
                previous.as_str(),
                entered.as_str(),
            );
            if entered.is_established() {
                logging::log_handshake_established(
                    &self.core.peer().to_string(),
                    self.core.age().as_millis() as u64,
                );
            }
        }
        Ok(ProcessOutcome::Dispatched)
    }
}
