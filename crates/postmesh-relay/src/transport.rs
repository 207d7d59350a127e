//! Transport construction for the libp2p driver.
//!
//! TCP + noise + yamux, optionally wrapped in a pnet handshake when a
//! private-swarm pre-shared key is configured. Peers without the same
//! key cannot complete the handshake.

use either::Either;
use libp2p::core::muxing::StreamMuxerBox;
use libp2p::core::transport::{Boxed, Transport};
use libp2p::core::upgrade::Version;
use libp2p::identity::Keypair;
use libp2p::pnet::{PnetConfig, PreSharedKey};
use libp2p::{noise, tcp, yamux, PeerId};

use postmesh_types::{PostmeshError, Result};

/// Builds the boxed transport stack for the swarm.
pub(crate) fn build_transport(
    keypair: &Keypair,
    psk: Option<PreSharedKey>,
) -> Result<Boxed<(PeerId, StreamMuxerBox)>> {
    let noise_config =
        noise::Config::new(keypair).map_err(|e| PostmeshError::NetworkError {
            reason: format!("failed to configure noise: {e}"),
        })?;
    let yamux_config = yamux::Config::default();

    let base_transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true));
    let maybe_private = match psk {
        Some(psk) => Either::Left(
            base_transport.and_then(move |socket, _| PnetConfig::new(psk).handshake(socket)),
        ),
        None => Either::Right(base_transport),
    };

    Ok(maybe_private
        .upgrade(Version::V1Lazy)
        .authenticate(noise_config)
        .multiplex(yamux_config)
        .boxed())
}
