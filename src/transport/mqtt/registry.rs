//! Socket to session lookup
//!
//! The ack dispatcher is handed a registry rather than reaching for a global
//! client list, so tests can build fixtures and embedders can keep sessions in
//! whatever structure they already have.

use super::session::Session;
use crate::transport::SocketHandle;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Resolves the session that owns a socket
pub trait ClientRegistry {
    /// TLS context type carried by the registered sessions
    type Tls;

    fn find_by_socket(&mut self, socket: SocketHandle) -> Option<&mut Session<Self::Tls>>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session has no socket to register under")]
    NoSocket,
    #[error("{0} is already registered to another session")]
    SocketInUse(SocketHandle),
    #[error("No session registered under {0}")]
    NotRegistered(SocketHandle),
}

/// In-memory registry keyed by socket handle.
///
/// An entry only resolves while its session still owns the socket it was
/// registered under. A session that reconnects onto a new socket through a
/// registry borrow must be moved with [`SessionRegistry::rekey`].
#[derive(Debug)]
pub struct SessionRegistry<T = ()> {
    sessions: HashMap<SocketHandle, Session<T>>,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its current socket.
    ///
    /// A socket identifies exactly one session, so a socket that is already
    /// registered is refused and the session handed back untouched.
    pub fn register(&mut self, session: Session<T>) -> Result<SocketHandle, (RegistryError, Session<T>)> {
        let Some(socket) = session.socket() else {
            return Err((RegistryError::NoSocket, session));
        };
        if self.sessions.contains_key(&socket) {
            return Err((RegistryError::SocketInUse(socket), session));
        }

        debug!(%socket, client_id = session.client_id(), "Registered session");
        self.sessions.insert(socket, session);
        Ok(socket)
    }

    /// Remove the session owning `socket`, typically once the socket is closed
    pub fn deregister(&mut self, socket: SocketHandle) -> Option<Session<T>> {
        let removed = self.sessions.remove(&socket);
        if let Some(session) = &removed {
            debug!(%socket, client_id = session.client_id(), "Deregistered session");
        }
        removed
    }

    pub fn get(&self, socket: SocketHandle) -> Option<&Session<T>> {
        self.sessions
            .get(&socket)
            .filter(|session| session.socket() == Some(socket))
    }

    /// Move the entry registered under `socket` to the socket its session
    /// currently owns, after a reset and reconnect.
    pub fn rekey(&mut self, socket: SocketHandle) -> Result<SocketHandle, RegistryError> {
        let current = self
            .sessions
            .get(&socket)
            .ok_or(RegistryError::NotRegistered(socket))?
            .socket()
            .ok_or(RegistryError::NoSocket)?;

        if current == socket {
            return Ok(socket);
        }
        if self.sessions.contains_key(&current) {
            return Err(RegistryError::SocketInUse(current));
        }

        if let Some(session) = self.sessions.remove(&socket) {
            debug!(from = %socket, to = %current, client_id = session.client_id(), "Re-keyed session");
            self.sessions.insert(current, session);
        }
        Ok(current)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<T> ClientRegistry for SessionRegistry<T> {
    type Tls = T;

    fn find_by_socket(&mut self, socket: SocketHandle) -> Option<&mut Session<T>> {
        self.sessions
            .get_mut(&socket)
            .filter(|session| session.socket() == Some(socket))
    }
}
