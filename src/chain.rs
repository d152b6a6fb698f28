use {
  crate::error::ProtocolError,
  bitcoin::{
    address::{Address, NetworkUnchecked, Payload},
    Network, PubkeyHash,
  },
  serde::{Deserialize, Serialize},
  std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
  Mainnet,
  Testnet,
  Signet,
  Regtest,
}

impl Chain {
  pub fn network(self) -> Network {
    match self {
      Self::Mainnet => Network::Bitcoin,
      Self::Testnet => Network::Testnet,
      Self::Signet => Network::Signet,
      Self::Regtest => Network::Regtest,
    }
  }

  pub fn address_from_pubkey_hash(self, pubkey_hash: PubkeyHash) -> Address {
    Address::new(self.network(), Payload::PubkeyHash(pubkey_hash))
  }

  /// Parses an address string and rejects addresses from other networks.
  pub fn parse_address(self, address: &str) -> Result<Address, ProtocolError> {
    address
      .parse::<Address<NetworkUnchecked>>()
      .map_err(|err| ProtocolError::Validation(format!("invalid address `{address}`: {err}")))?
      .require_network(self.network())
      .map_err(|_| {
        ProtocolError::Validation(format!("address `{address}` is not valid for {self}"))
      })
  }
}

impl Display for Chain {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Mainnet => "mainnet",
        Self::Testnet => "testnet",
        Self::Signet => "signet",
        Self::Regtest => "regtest",
      }
    )
  }
}

impl FromStr for Chain {
  type Err = ProtocolError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "mainnet" => Ok(Self::Mainnet),
      "testnet" => Ok(Self::Testnet),
      "signet" => Ok(Self::Signet),
      "regtest" => Ok(Self::Regtest),
      _ => Err(ProtocolError::Validation(format!("invalid chain `{s}`"))),
    }
  }
}
