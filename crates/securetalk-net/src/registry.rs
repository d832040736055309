//! The bidirectional mapping between stable client identities and
//! connection state records. Reactor-exclusive: workers address connections
//! only by [`ClientId`], and only via the outbound queue, which the reactor
//! drains serially. Invariant: the two maps are always mutually consistent.

use std::collections::HashMap;

use mio::Token;

use crate::client_id::ClientId;
use crate::connection::ConnectionState;

#[derive(Default)]
pub struct ConnectionRegistry {
    by_id: HashMap<ClientId, ConnectionState>,
    id_by_token: HashMap<Token, ClientId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a newly accepted connection. Panics if the `ClientId` already
    /// exists — by construction (see [`ClientId::mint`]) this cannot happen.
    pub fn insert(&mut self, state: ConnectionState) {
        let client_id = state.client_id;
        let token = state.token;
        let previous = self.by_id.insert(client_id, state);
        assert!(previous.is_none(), "ClientId minted twice");
        self.id_by_token.insert(token, client_id);
    }

    pub fn lookup_by_id(&self, client_id: ClientId) -> Option<&ConnectionState> {
        self.by_id.get(&client_id)
    }

    pub fn lookup_by_id_mut(&mut self, client_id: ClientId) -> Option<&mut ConnectionState> {
        self.by_id.get_mut(&client_id)
    }

    pub fn lookup_by_token(&self, token: Token) -> Option<&ConnectionState> {
        self.id_by_token.get(&token).and_then(|id| self.by_id.get(id))
    }

    pub fn lookup_by_token_mut(&mut self, token: Token) -> Option<&mut ConnectionState> {
        let id = *self.id_by_token.get(&token)?;
        self.by_id.get_mut(&id)
    }

    /// Removes a connection by the identity carried in its own state,
    /// evicting both directions. Used on close.
    pub fn remove_by_state(&mut self, client_id: ClientId) -> Option<ConnectionState> {
        let state = self.by_id.remove(&client_id)?;
        self.id_by_token.remove(&state.token);
        Some(state)
    }

    pub fn remove_by_token(&mut self, token: Token) -> Option<ConnectionState> {
        let client_id = self.id_by_token.remove(&token)?;
        self.by_id.remove(&client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &ConnectionState)> {
        self.by_id.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ClientId, &mut ConnectionState)> {
        self.by_id.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn drain(&mut self) -> Vec<ConnectionState> {
        self.id_by_token.clear();
        self.by_id.drain().map(|(_, state)| state).collect()
    }

    #[cfg(test)]
    fn is_mutually_consistent(&self) -> bool {
        if self.by_id.len() != self.id_by_token.len() {
            return false;
        }
        self.by_id.values().all(|state| self.id_by_token.get(&state.token) == Some(&state.client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{SocketAddr, TcpListener};

    fn dummy_state(client_id: ClientId, token: Token) -> ConnectionState {
        // mio requires a real socket to construct a TcpStream; use a local
        // loopback pair purely as a placeholder handle for registry tests.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let std_stream = std::net::TcpStream::connect(addr).unwrap();
        std_stream.set_nonblocking(true).unwrap();
        let socket = mio::net::TcpStream::from_std(std_stream);
        let peer_addr: SocketAddr = addr;
        ConnectionState::new(client_id, token, socket, peer_addr)
    }

    #[test]
    fn insert_lookup_remove_round_trip() {
        let mut registry = ConnectionRegistry::new();
        let id = ClientId::mint();
        let token = Token(7);
        registry.insert(dummy_state(id, token));

        assert!(registry.lookup_by_id(id).is_some());
        assert!(registry.lookup_by_token(token).is_some());
        assert!(registry.is_mutually_consistent());

        let removed = registry.remove_by_state(id);
        assert!(removed.is_some());
        assert!(registry.lookup_by_id(id).is_none());
        assert!(registry.lookup_by_token(token).is_none());
        assert!(registry.is_mutually_consistent());
    }

    #[test]
    fn stays_consistent_across_many_accept_close_cycles() {
        let mut registry = ConnectionRegistry::new();
        let mut live = Vec::new();
        for i in 0..50u16 {
            let id = ClientId::mint();
            let token = Token(i as usize);
            registry.insert(dummy_state(id, token));
            live.push(id);
            if i % 3 == 0 {
                if let Some(victim) = live.pop() {
                    registry.remove_by_state(victim);
                }
            }
            assert!(registry.is_mutually_consistent());
        }
    }
}
