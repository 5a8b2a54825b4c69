//! IKE SA negotiation states
//!
//! Each state owns exactly the data its phase of the handshake needs:
//! the initiator's half of the DH exchange lives in
//! [`InitRequestedState`] and dies with it, the wire image of the first
//! exchange and the nonces survive into the AUTH phase states because
//! the AUTH octets are computed over them.
//!
//! ```text
//!             initiate()                 IKE_SA_INIT response        IKE_AUTH response
//!   IDLE ──────────────────► IKE_SA_INIT_REQUESTED ──────► IKE_AUTH_REQUESTED ──────► ESTABLISHED
//!    │
//!    │  IKE_SA_INIT request                IKE_AUTH request
//!    └─────────────────► IKE_SA_INIT_RESPONDED ──────► IKE_AUTH_RESPONDED
//! ```
//!
//! A state processes one message and either returns its successor or an
//! error. On error nothing is installed: the session keeps its current
//! state and the caller decides whether the SA survives. Retransmitted
//! requests never reach a state; [`super::session::IkeSa`] answers them
//! from the recorded response.

use std::fmt;

use crate::auth;
use crate::chunk::Chunk;
use crate::constants::ExchangeType;
use crate::crypto::dh::{self, DhGroupId, DiffieHellman};
use crate::error::{Error, Result};
use crate::logging;
use crate::message::Message;
use crate::payload::{KePayload, NoncePayload, Payload, SaPayload};
use crate::proposal::{select_proposal, DhTransformId, Proposal, TransformType};
use crate::sa::id::Role;
use crate::sa::session::SessionCore;

/// Discriminant of an [`SaState`], used for checks and log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// No exchange has happened yet
    Idle,
    /// IKE_SA_INIT request sent, waiting for the response
    InitRequested,
    /// IKE_SA_INIT response sent, waiting for IKE_AUTH
    InitResponded,
    /// IKE_AUTH request sent, waiting for the response
    AuthRequested,
    /// IKE_AUTH answered, the SA is up on the responder side
    AuthResponded,
    /// Handshake complete on the initiator side
    Established,
}

impl StateKind {
    /// Protocol-style name for log records
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Idle => "IDLE",
            StateKind::InitRequested => "IKE_SA_INIT_REQUESTED",
            StateKind::InitResponded => "IKE_SA_INIT_RESPONDED",
            StateKind::AuthRequested => "IKE_AUTH_REQUESTED",
            StateKind::AuthResponded => "IKE_AUTH_RESPONDED",
            StateKind::Established => "ESTABLISHED",
        }
    }

    /// Whether the handshake has completed in this state
    pub fn is_established(self) -> bool {
        matches!(self, StateKind::AuthResponded | StateKind::Established)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one IKE SA, with the data that phase carries.
pub enum SaState {
    /// Nothing sent or received yet
    Idle(IdleState),
    /// Waiting for the IKE_SA_INIT response
    InitRequested(InitRequestedState),
    /// Waiting for the IKE_AUTH request
    InitResponded(InitRespondedState),
    /// Waiting for the IKE_AUTH response
    AuthRequested(AuthRequestedState),
    /// Established, responder side
    AuthResponded(AuthRespondedState),
    /// Established, initiator side
    Established(EstablishedState),
}

impl SaState {
    /// The state's discriminant
    pub fn kind(&self) -> StateKind {
        match self {
            SaState::Idle(_) => StateKind::Idle,
            SaState::InitRequested(_) => StateKind::InitRequested,
            SaState::InitResponded(_) => StateKind::InitResponded,
            SaState::AuthRequested(_) => StateKind::AuthRequested,
            SaState::AuthResponded(_) => StateKind::AuthResponded,
            SaState::Established(_) => StateKind::Established,
        }
    }

    /// Process one message in the current state.
    ///
    /// Returns the successor state on a transition, `None` when the
    /// message was consumed without one. Once established, both sides
    /// refuse further handshake exchanges; rekeying and INFORMATIONAL
    /// run over separate machinery.
    pub(crate) fn process(
        &mut self,
        core: &mut SessionCore,
        message: &mut Message,
    ) -> Result<Option<SaState>> {
        let kind = self.kind();
        match self {
            SaState::Idle(state) => state.process(core, message),
            SaState::InitRequested(state) => state.process(core, message),
            SaState::InitResponded(state) => state.process(core, message),
            SaState::AuthRequested(state) => state.process(core, message),
            SaState::AuthResponded(_) | SaState::Established(_) => {
                Err(Error::ProtocolMismatch(format!(
                    "no handshake exchange is accepted in state {}",
                    kind
                )))
            }
        }
    }
}

/// Initial state. An initiator leaves it through
/// [`super::session::IkeSa::initiate`]; a responder leaves it by
/// answering the peer's IKE_SA_INIT request.
pub struct IdleState;

impl IdleState {
    fn process(
        &mut self,
        core: &mut SessionCore,
        message: &mut Message,
    ) -> Result<Option<SaState>> {
        // Validate role, exchange type and direction
        if core.role() != Role::Responder {
            return Err(Error::ProtocolMismatch(
                "session has not been initiated".into(),
            ));
        }
        if message.header.exchange_type != ExchangeType::IkeSaInit {
            return Err(Error::ProtocolMismatch(format!(
                "expected an IKE_SA_INIT request, got {}",
                message.header.exchange_type
            )));
        }
        if !message.header.flags.is_request() || !message.header.flags.is_initiator() {
            return Err(Error::ProtocolMismatch(
                "IKE_SA_INIT request must carry the initiator and request flags".into(),
            ));
        }
        if message.header.message_id != 0 {
            return Err(Error::ProtocolMismatch(format!(
                "IKE_SA_INIT request must use message ID 0, got {}",
                message.header.message_id
            )));
        }

        // The first exchange travels in the clear
        message.parse_body(None, None)?;

        // The peer's SPI half becomes known once the request parses
        core.set_initiator_spi(message.header.initiator_spi);

        // A request may offer several proposals; pick the first
        // acceptable one. Unknown non-critical payloads (vendor IDs,
        // notifies) are skipped.
        let mut received_nonce = Chunk::empty();
        let mut peer_ke: Option<&KePayload> = None;
        let mut selected: Option<Proposal> = None;

        for payload in message.payloads() {
            match payload {
                Payload::Sa(sa) => {
                    let chosen = match select_proposal(&sa.proposals, &core.config().proposals) {
                        Ok(p) => {
                            logging::log_proposal_negotiation(
                                sa.proposals.len(),
                                Some(p.proposal_num),
                            );
                            p.clone()
                        }
                        Err(err) => {
                            logging::log_proposal_negotiation(sa.proposals.len(), None);
                            return Err(err);
                        }
                    };
                    core.create_transforms_from_proposal(&chosen)?;
                    selected = Some(chosen);
                }
                Payload::Ke(ke) => {
                    peer_ke = Some(ke);
                }
                Payload::Nonce(nonce) => {
                    received_nonce.replace(Chunk::from_slice(&nonce.nonce));
                }
                Payload::Unknown { .. } => {}
                other => {
                    return Err(Error::UnsupportedPayload(other.payload_type()));
                }
            }
        }

        let selected = selected.ok_or_else(|| {
            Error::NegotiationFailed("IKE_SA_INIT request carried no SA payload".into())
        })?;
        let transforms = core
            .transforms()
            .ok_or_else(|| Error::Internal("transform set missing after negotiation".into()))?;
        let ke = peer_ke.ok_or_else(|| {
            Error::InvalidPayload("IKE_SA_INIT request carried no KE payload".into())
        })?;
        if received_nonce.is_empty() {
            return Err(Error::InvalidPayload(
                "IKE_SA_INIT request carried no nonce payload".into(),
            ));
        }

        // The KE data must belong to the group the selected proposal names
        if ke.dh_group != transforms.dh_group.to_u16() {
            return Err(Error::NegotiationFailed(format!(
                "KE payload group {} does not match the selected proposal's group {}",
                ke.dh_group,
                transforms.dh_group.to_u16()
            )));
        }

        let mut dh = dh::create(transforms.dh_group)?;
        let shared_secret = dh.compute_shared_secret(&ke.key_data)?;
        let sent_nonce = Chunk::random(core.config().nonce_length);

        core.compute_secrets(&shared_secret, &sent_nonce, &received_nonce)?;

        // Reply with exactly the selected proposal, our KE value and nonce
        let mut response = core.build_response(ExchangeType::IkeSaInit, 0);
        response.add_payload(Payload::Sa(SaPayload::new(vec![selected])));
        response.add_payload(Payload::Ke(KePayload::new(
            transforms.dh_group.to_u16(),
            dh.public_value().to_vec(),
        )));
        response.add_payload(Payload::Nonce(NoncePayload::new(sent_nonce.to_vec())?));

        let packet = response.generate(None, None)?;
        core.enqueue(ExchangeType::IkeSaInit, packet);

        let successor = InitRespondedState {
            init_request_raw: message
                .raw()
                .map(|r| r.to_vec())
                .ok_or_else(|| Error::Internal("received message has no wire image".into()))?,
            sent_nonce,
            received_nonce,
        };

        core.set_last_responded_message(response)?;

        Ok(Some(SaState::InitResponded(successor)))
    }
}

/// Initiator waiting for the IKE_SA_INIT response. Owns the ephemeral
/// DH exchange and the nonce sent with the request.
pub struct InitRequestedState {
    pub(crate) dh: Box<dyn DiffieHellman>,
    pub(crate) sent_nonce: Chunk,
}

impl InitRequestedState {
    /// Build, send and record the IKE_SA_INIT request.
    ///
    /// KE data is offered for the first configured proposal's group; a
    /// responder picking a different group fails the exchange when its
    /// response arrives.
    pub(crate) fn initiate(core: &mut SessionCore) -> Result<InitRequestedState> {
        let proposals = core.config().proposals.clone();

        let group_transform = proposals
            .first()
            .and_then(|p| p.get_transform(TransformType::Dh))
            .ok_or_else(|| Error::InvalidConfig("first proposal has no DH transform".into()))?;
        let group = DhTransformId::from_u16(group_transform.transform_id)
            .map(DhGroupId::from_transform)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "unsupported DH group {}",
                    group_transform.transform_id
                ))
            })?;

        let dh = dh::create(group)?;
        let sent_nonce = Chunk::random(core.config().nonce_length);

        let mut request = core.build_request(ExchangeType::IkeSaInit);
        request.add_payload(Payload::Sa(SaPayload::new(proposals)));
        request.add_payload(Payload::Ke(KePayload::new(
            group.to_u16(),
            dh.public_value().to_vec(),
        )));
        request.add_payload(Payload::Nonce(NoncePayload::new(sent_nonce.to_vec())?));

        let packet = request.generate(None, None)?;
        core.enqueue(ExchangeType::IkeSaInit, packet);
        core.set_last_requested_message(request)?;

        Ok(InitRequestedState { dh, sent_nonce })
    }

    fn process(
        &mut self,
        core: &mut SessionCore,
        message: &mut Message,
    ) -> Result<Option<SaState>> {
        // Validate exchange type, direction and message ID
        if message.header.exchange_type != ExchangeType::IkeSaInit {
            return Err(Error::ProtocolMismatch(format!(
                "expected an IKE_SA_INIT response, got {}",
                message.header.exchange_type
            )));
        }
        if message.header.flags.is_request() {
            return Err(Error::ProtocolMismatch(
                "expected an IKE_SA_INIT response, got a request".into(),
            ));
        }
        if Some(message.header.message_id) != core.expected_response_id() {
            return Err(Error::ProtocolMismatch(format!(
                "response message ID {} does not match the outstanding request",
                message.header.message_id
            )));
        }

        // The first exchange travels in the clear
        message.parse_body(None, None)?;

        // The peer's SPI half becomes known once the response parses
        core.set_responder_spi(message.header.responder_spi);

        // Walk the payloads in wire order. A response must select
        // exactly one proposal; anything unexpected is fatal.
        let mut received_nonce = Chunk::empty();
        let mut peer_ke: Option<&KePayload> = None;

        for payload in message.payloads() {
            match payload {
                Payload::Sa(sa) => {
                    if sa.proposals.len() != 1 {
                        return Err(Error::NegotiationFailed(format!(
                            "IKE_SA_INIT response must select exactly one proposal, got {}",
                            sa.proposals.len()
                        )));
                    }
                    let selected = match select_proposal(&sa.proposals, &core.config().proposals)
                    {
                        Ok(p) => {
                            logging::log_proposal_negotiation(
                                sa.proposals.len(),
                                Some(p.proposal_num),
                            );
                            p
                        }
                        Err(err) => {
                            logging::log_proposal_negotiation(sa.proposals.len(), None);
                            return Err(err);
                        }
                    };
                    core.create_transforms_from_proposal(selected)?;
                }
                Payload::Ke(ke) => {
                    peer_ke = Some(ke);
                }
                Payload::Nonce(nonce) => {
                    // A repeated nonce payload replaces the previous one
                    received_nonce.replace(Chunk::from_slice(&nonce.nonce));
                }
                other => {
                    return Err(Error::UnsupportedPayload(other.payload_type()));
                }
            }
        }

        let transforms = core.transforms().ok_or_else(|| {
            Error::NegotiationFailed("IKE_SA_INIT response carried no SA payload".into())
        })?;
        let ke = peer_ke.ok_or_else(|| {
            Error::InvalidPayload("IKE_SA_INIT response carried no KE payload".into())
        })?;
        if received_nonce.is_empty() {
            return Err(Error::InvalidPayload(
                "IKE_SA_INIT response carried no nonce payload".into(),
            ));
        }

        // The response must stay inside the group we offered key data for
        if transforms.dh_group != self.dh.group() {
            return Err(Error::NegotiationFailed(format!(
                "selected proposal wants DH group {}, we offered {}",
                transforms.dh_group.to_u16(),
                self.dh.group().to_u16()
            )));
        }
        if ke.dh_group != self.dh.group().to_u16() {
            return Err(Error::NegotiationFailed(format!(
                "KE payload group {} does not match the negotiated group {}",
                ke.dh_group,
                self.dh.group().to_u16()
            )));
        }

        let shared_secret = self.dh.compute_shared_secret(&ke.key_data)?;
        core.compute_secrets(&shared_secret, &self.sent_nonce, &received_nonce)?;

        // Our AUTH covers the init request exactly as it went out
        let init_request_raw = core
            .last_requested_message()
            .and_then(|m| m.raw())
            .map(|r| r.to_vec())
            .ok_or_else(|| Error::Internal("IKE_SA_INIT request was not recorded".into()))?;

        let local_id = core.config().local_id.clone();
        let psk = core.config().psk.clone();
        let prf_alg = transforms.prf;

        let signed_octets = {
            let keys = core
                .keys()
                .ok_or_else(|| Error::Internal("key material missing after derivation".into()))?;
            auth::construct_initiator_signed_octets(
                prf_alg,
                &init_request_raw,
                received_nonce.as_slice(),
                keys.sk_pi.as_slice(),
                &local_id.to_payload_data(),
            )
        };
        let auth_payload = auth::compute_psk_auth(prf_alg, psk.as_slice(), &signed_octets);

        let mut request = core.build_request(ExchangeType::IkeAuth);
        request.add_payload(Payload::IdInit(local_id));
        request.add_payload(Payload::Auth(auth_payload));

        let packet = request.generate(core.outbound_crypter(), core.outbound_signer())?;
        core.enqueue(ExchangeType::IkeAuth, packet);

        let successor = AuthRequestedState {
            init_response_raw: message
                .raw()
                .map(|r| r.to_vec())
                .ok_or_else(|| Error::Internal("received message has no wire image".into()))?,
            sent_nonce: self.sent_nonce.take(),
        };

        core.set_last_requested_message(request)?;

        Ok(Some(SaState::AuthRequested(successor)))
    }
}

/// Responder that has answered IKE_SA_INIT and waits for the
/// initiator's IKE_AUTH. Carries the initiator's first message and
/// both nonces for AUTH octet construction.
pub struct InitRespondedState {
    pub(crate) init_request_raw: Vec<u8>,
    pub(crate) sent_nonce: Chunk,
    pub(crate) received_nonce: Chunk,
}

impl InitRespondedState {
    fn process(
        &mut self,
        core: &mut SessionCore,
        message: &mut Message,
    ) -> Result<Option<SaState>> {
        // Validate exchange type, direction and message ID
        if message.header.exchange_type != ExchangeType::IkeAuth {
            return Err(Error::ProtocolMismatch(format!(
                "expected an IKE_AUTH request, got {}",
                message.header.exchange_type
            )));
        }
        if !message.header.flags.is_request() || !message.header.flags.is_initiator() {
            return Err(Error::ProtocolMismatch(
                "IKE_AUTH request must carry the initiator and request flags".into(),
            ));
        }
        if message.header.message_id != 1 {
            return Err(Error::ProtocolMismatch(format!(
                "IKE_AUTH request must use message ID 1, got {}",
                message.header.message_id
            )));
        }

        message.parse_body(core.inbound_crypter(), core.inbound_signer())?;

        let id_i = message.id_initiator().ok_or_else(|| {
            Error::InvalidPayload("IKE_AUTH request carried no IDi payload".into())
        })?;
        let auth_payload = message.auth_payload().ok_or_else(|| {
            Error::InvalidPayload("IKE_AUTH request carried no AUTH payload".into())
        })?;

        let transforms = core
            .transforms()
            .ok_or_else(|| Error::Internal("transform set missing after key derivation".into()))?;
        let prf_alg = transforms.prf;
        let psk = core.config().psk.clone();
        let peer_label = id_i
            .as_string()
            .unwrap_or_else(|| hex::encode(&id_i.data));

        // The initiator signed its own first message, keyed with SK_pi
        let signed_octets = {
            let keys = core
                .keys()
                .ok_or_else(|| Error::Internal("key material missing after derivation".into()))?;
            auth::construct_initiator_signed_octets(
                prf_alg,
                &self.init_request_raw,
                self.sent_nonce.as_slice(),
                keys.sk_pi.as_slice(),
                &id_i.to_payload_data(),
            )
        };
        if let Err(err) = auth::verify_psk_auth(prf_alg, psk.as_slice(), &signed_octets, auth_payload)
        {
            logging::log_authentication_failed(&peer_label, "AUTH payload mismatch");
            return Err(err);
        }

        // Peer identity must match policy when one is configured
        if let Some(expected) = &core.config().remote_id {
            if expected != id_i {
                logging::log_authentication_failed(&peer_label, "identity does not match policy");
                return Err(Error::AuthenticationFailed(
                    "initiator identity does not match the configured remote identity".into(),
                ));
            }
        }
        logging::log_authentication_success(&peer_label, "PSK");

        // Our own AUTH covers the init response exactly as it went out
        let init_response_raw = core
            .last_responded_message()
            .and_then(|m| m.raw())
            .map(|r| r.to_vec())
            .ok_or_else(|| Error::Internal("IKE_SA_INIT response was not recorded".into()))?;

        let local_id = core.config().local_id.clone();
        let own_signed_octets = {
            let keys = core
                .keys()
                .ok_or_else(|| Error::Internal("key material missing after derivation".into()))?;
            auth::construct_responder_signed_octets(
                prf_alg,
                &init_response_raw,
                self.received_nonce.as_slice(),
                keys.sk_pr.as_slice(),
                &local_id.to_payload_data(),
            )
        };
        let own_auth = auth::compute_psk_auth(prf_alg, psk.as_slice(), &own_signed_octets);

        let mut response = core.build_response(ExchangeType::IkeAuth, message.header.message_id);
        response.add_payload(Payload::IdResp(local_id));
        response.add_payload(Payload::Auth(own_auth));

        let packet = response.generate(core.outbound_crypter(), core.outbound_signer())?;
        core.enqueue(ExchangeType::IkeAuth, packet);
        core.set_last_responded_message(response)?;

        Ok(Some(SaState::AuthResponded(AuthRespondedState)))
    }
}

/// Initiator waiting for the IKE_AUTH response. Carries the responder's
/// init response and our nonce so the peer's AUTH can be checked.
pub struct AuthRequestedState {
    pub(crate) init_response_raw: Vec<u8>,
    pub(crate) sent_nonce: Chunk,
}

impl AuthRequestedState {
    fn process(
        &mut self,
        core: &mut SessionCore,
        message: &mut Message,
    ) -> Result<Option<SaState>> {
        // Validate exchange type, direction and message ID
        if message.header.exchange_type != ExchangeType::IkeAuth {
            return Err(Error::ProtocolMismatch(format!(
                "expected an IKE_AUTH response, got {}",
                message.header.exchange_type
            )));
        }
        if message.header.flags.is_request() {
            return Err(Error::ProtocolMismatch(
                "expected an IKE_AUTH response, got a request".into(),
            ));
        }
        if Some(message.header.message_id) != core.expected_response_id() {
            return Err(Error::ProtocolMismatch(format!(
                "response message ID {} does not match the outstanding request",
                message.header.message_id
            )));
        }

        message.parse_body(core.inbound_crypter(), core.inbound_signer())?;

        let id_r = message.id_responder().ok_or_else(|| {
            Error::InvalidPayload("IKE_AUTH response carried no IDr payload".into())
        })?;
        let auth_payload = message.auth_payload().ok_or_else(|| {
            Error::InvalidPayload("IKE_AUTH response carried no AUTH payload".into())
        })?;

        let transforms = core
            .transforms()
            .ok_or_else(|| Error::Internal("transform set missing after key derivation".into()))?;
        let prf_alg = transforms.prf;
        let peer_label = id_r
            .as_string()
            .unwrap_or_else(|| hex::encode(&id_r.data));

        // The responder signed its init response, keyed with SK_pr
        let signed_octets = {
            let keys = core
                .keys()
                .ok_or_else(|| Error::Internal("key material missing after derivation".into()))?;
            auth::construct_responder_signed_octets(
                prf_alg,
                &self.init_response_raw,
                self.sent_nonce.as_slice(),
                keys.sk_pr.as_slice(),
                &id_r.to_payload_data(),
            )
        };
        if let Err(err) = auth::verify_psk_auth(
            prf_alg,
            core.config().psk.as_slice(),
            &signed_octets,
            auth_payload,
        ) {
            logging::log_authentication_failed(&peer_label, "AUTH payload mismatch");
            return Err(err);
        }

        // Peer identity must match policy when one is configured
        if let Some(expected) = &core.config().remote_id {
            if expected != id_r {
                logging::log_authentication_failed(&peer_label, "identity does not match policy");
                return Err(Error::AuthenticationFailed(
                    "responder identity does not match the configured remote identity".into(),
                ));
            }
        }
        logging::log_authentication_success(&peer_label, "PSK");

        Ok(Some(SaState::Established(EstablishedState)))
    }
}

/// Responder-side terminal state.
pub struct AuthRespondedState;

/// Initiator-side terminal state.
pub struct EstablishedState;
