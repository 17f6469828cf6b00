//! Pending Account Creation
//!
//! Holds fresh or recovered entropy while the user backs up the phrase.
//! Nothing reaches the key store until `commit`; dropping or cancelling
//! the pending creation zeroes the entropy.

use super::derivation::{DerivationError, DerivedAddress, HdAddressDeriver};
use super::keygen::{entropy_from_mnemonic, generate_entropy, mnemonic_from_entropy};
use super::keystore::WalletKeyStore;
use super::model::{AccountInformation, HdWalletAddressDetail, Wallet};
use crate::crypto::port::{DerivationType, KeyDerivationPort};
use crate::{log_info, log_warn};
use zeroize::Zeroizing;

pub struct PendingAccountCreation {
    wallet: Wallet,
    derivation_type: DerivationType,
    first_address: Option<DerivedAddress>,
    is_recovery: bool,
}

impl PendingAccountCreation {
    /// Brand new wallet with OS entropy
    pub fn generate(name: impl Into<String>) -> Result<Self, DerivationError> {
        Ok(Self::with_wallet(Wallet::new(name, generate_entropy()?), false))
    }

    /// Wallet restored from a 24-word phrase
    pub fn recover(name: impl Into<String>, phrase: &str) -> Result<Self, DerivationError> {
        let entropy = entropy_from_mnemonic(phrase)?;
        Ok(Self::with_wallet(Wallet::new(name, entropy), true))
    }

    fn with_wallet(wallet: Wallet, is_recovery: bool) -> Self {
        Self {
            wallet,
            derivation_type: DerivationType::default(),
            first_address: None,
            is_recovery,
        }
    }

    pub fn with_derivation_type(mut self, derivation_type: DerivationType) -> Self {
        self.derivation_type = derivation_type;
        self.first_address = None;
        self
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet.id
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn is_recovery(&self) -> bool {
        self.is_recovery
    }

    /// Phrase to show during backup
    pub fn mnemonic(&self) -> Result<Zeroizing<String>, DerivationError> {
        mnemonic_from_entropy(&self.wallet.entropy)
    }

    /// Account 0, change 0, index 0 of the pending wallet
    pub fn first_address<P: KeyDerivationPort>(
        &mut self,
        deriver: &HdAddressDeriver<P>,
    ) -> Result<&DerivedAddress, DerivationError> {
        if self.first_address.is_none() {
            let mut detail = HdWalletAddressDetail::new(self.wallet.id.clone(), 0, 0, 0);
            detail.derivation_type = self.derivation_type;
            self.first_address = Some(deriver.derive_address(&self.wallet, &detail)?);
        }
        match &self.first_address {
            Some(derived) => Ok(derived),
            None => Err(DerivationError::WalletNotFound(self.wallet.id.clone())),
        }
    }

    /// Persist the wallet and its first address, returning the new account
    pub fn commit<P, S>(
        mut self,
        deriver: &HdAddressDeriver<P>,
        store: &S,
        account_name: impl Into<String>,
    ) -> Result<AccountInformation, DerivationError>
    where
        P: KeyDerivationPort,
        S: WalletKeyStore + ?Sized,
    {
        let derived = self.first_address(deriver)?.clone();
        let mut account =
            AccountInformation::hd(derived.address.clone(), account_name, derived.detail.clone());
        account.is_backed_up = self.is_recovery;
        account.validate()?;

        store.save_wallet(&self.wallet)?;
        if let Err(e) = store.save_address(&derived.clone().into_record()) {
            // Leave no orphaned entropy behind
            if let Err(rollback) = store.delete_wallet(&self.wallet.id) {
                log_warn!(
                    "wallet.creation",
                    "rollback failed",
                    wallet_id = self.wallet.id,
                    error = rollback,
                );
            }
            return Err(e.into());
        }

        log_info!(
            "wallet.creation",
            "wallet committed",
            wallet_id = self.wallet.id,
            address = derived.address,
        );

        Ok(account)
    }

    /// Discard the pending wallet; entropy is zeroed on drop
    pub fn cancel(self) {}
}
