use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use algo_hd_core::crypto::address::encode_address;
use algo_hd_core::crypto::XhdKeyDerivation;
use algo_hd_core::security::SecretBytes;
use algo_hd_core::tx::transaction::{bytes_to_sign, TransactionBody};
use algo_hd_core::tx::{
    AccountState, AlgosTransactionSendDraft, BatchTransactionSigner, CanonicalComposer, Destination,
    HardwareSignRequest, HardwareSigner, LedgerError, TransactionComposer, TransactionDataBuilder,
    TransactionDataItem, TransactionParams, TransactionSendDraft, WcErrorReason,
    WcTransactionErrorResponse,
};
use algo_hd_core::wallet::{
    AccountAuthorizationResolver, AccountInformation, DerivedAddress, HdAddressDeriver,
    HdWalletAddressDetail, LedgerDetail, MemoryKeyStore, Wallet, WalletKeyStore,
};

const RECEIVER: &str = "EZRVNZFJGOUZC67FUMEC7ZMVP232TPICFTQCVZ6EQEIRRT3TIHSKZULRNI";
const WATCHED: &str = "YIIC6GF4DUJYZTYTZ5UEOAXONUUKZRDFOTV4EKSGD5E7BYE6EE3IVPYEDQ";

enum DeviceBehaviour {
    Sign,
    Fail(LedgerError),
    Hang,
}

struct MockLedger {
    key: SigningKey,
    behaviour: DeviceBehaviour,
    requests: AtomicUsize,
    disconnected: AtomicBool,
}

impl MockLedger {
    fn new(behaviour: DeviceBehaviour) -> Self {
        Self {
            key: SigningKey::from_bytes(&[7u8; 32]),
            behaviour,
            requests: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
        }
    }

    fn address(&self) -> String {
        encode_address(self.key.verifying_key().as_bytes()).expect("valid key")
    }
}

#[async_trait]
impl HardwareSigner for MockLedger {
    async fn sign(&self, request: HardwareSignRequest) -> Result<Vec<u8>, LedgerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            DeviceBehaviour::Sign => Ok(self.key.sign(&request.message).to_bytes().to_vec()),
            DeviceBehaviour::Fail(error) => Err(error.clone()),
            DeviceBehaviour::Hang => std::future::pending().await,
        }
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

fn ledger_detail() -> LedgerDetail {
    LedgerDetail {
        id: "device-1".into(),
        name: "Nano X".into(),
        index_in_ledger: 0,
    }
}

fn params() -> TransactionParams {
    TransactionParams {
        fee: 0,
        min_fee: 1_000,
        last_round: 40_000_000,
        genesis_id: "testnet-v1.0".into(),
        genesis_hash: vec![3u8; 32],
    }
}

fn payment(sender: &str) -> TransactionDataItem {
    let mut draft = AlgosTransactionSendDraft::new(AccountState::new(sender, 5_000_000));
    draft.to = Some(Destination::Account { address: RECEIVER.into() });
    draft.amount = Some(250_000);

    let params = params();
    let mut items = TransactionDataBuilder::new(&params, None, &CanonicalComposer)
        .compose(&TransactionSendDraft::Algos(draft))
        .expect("payment composes");
    assert_eq!(items.len(), 1);
    items.remove(0)
}

struct Fixture {
    port: XhdKeyDerivation,
    store: MemoryKeyStore,
    hd: DerivedAddress,
}

impl Fixture {
    fn new() -> Self {
        let port = XhdKeyDerivation::new();
        let store = MemoryKeyStore::new();
        let wallet = Wallet::with_id("wallet-1", "Main", SecretBytes::new(vec![11u8; 32]));
        store.save_wallet(&wallet).expect("wallet saved");

        let detail = HdWalletAddressDetail::new("wallet-1", 0, 0, 0);
        let hd = HdAddressDeriver::new(XhdKeyDerivation::new())
            .derive_address(&wallet, &detail)
            .expect("address derives");
        Self { port, store, hd }
    }

    fn hd_account(&self) -> AccountInformation {
        AccountInformation::hd(self.hd.address.clone(), "Spending", self.hd.detail.clone())
    }
}

fn assert_signed_by(signed: &[u8], unsigned: &[u8], public_key: &[u8; 32]) {
    let decoded = CanonicalComposer.decode_signed(signed).expect("signed decodes");
    let key = VerifyingKey::from_bytes(public_key).expect("public key");
    let signature = Signature::from_slice(&decoded.sig).expect("64-byte signature");
    assert!(key.verify(&bytes_to_sign(unsigned), &signature).is_ok());
}

#[tokio::test]
async fn mixed_batch_signs_in_order_with_placeholders() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Sign);
    let ledger_address = ledger.address();
    let accounts = vec![
        fixture.hd_account(),
        AccountInformation::watch(WATCHED, "Watched"),
        AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail()),
    ];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let items = vec![payment(&fixture.hd.address), payment(WATCHED), payment(&ledger_address)];
    let unsigned: Vec<Vec<u8>> = items.iter().map(|item| item.transaction.clone()).collect();

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let signed = signer.sign_all(items, &resolver, cancel).await.expect("batch signs");

    assert_eq!(signed.len(), 3);
    assert!(signed[1].is_none());
    assert_signed_by(signed[0].as_ref().expect("hd signed"), &unsigned[0], &fixture.hd.public_key);
    assert_signed_by(
        signed[2].as_ref().expect("ledger signed"),
        &unsigned[2],
        ledger.key.verifying_key().as_bytes(),
    );
    assert_eq!(ledger.requests.load(Ordering::SeqCst), 1);
    assert!(ledger.disconnected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn local_only_batch_leaves_device_alone() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Sign);
    let accounts = vec![fixture.hd_account()];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let signed = signer
        .sign_all(vec![payment(&fixture.hd.address)], &resolver, cancel)
        .await
        .expect("batch signs");

    assert!(signed[0].is_some());
    assert_eq!(ledger.requests.load(Ordering::SeqCst), 0);
    assert!(!ledger.disconnected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn account_rekeyed_to_ledger_records_authorizer() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Sign);
    let ledger_address = ledger.address();
    let accounts = vec![AccountInformation::standard(WATCHED, "Delegated")
        .rekeyed_to(ledger_address.clone(), Some(ledger_detail()))];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let item = payment(WATCHED);
    let unsigned = item.transaction.clone();
    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let signed = signer.sign_all(vec![item], &resolver, cancel).await.expect("batch signs");

    let bytes = signed[0].as_ref().expect("signed");
    let decoded = CanonicalComposer.decode_signed(bytes).expect("decodes");
    assert_eq!(decoded.sgnr.as_deref(), Some(ledger_address.as_str()));
    assert_eq!(decoded.txn.sender, WATCHED);
    assert_signed_by(bytes, &unsigned, ledger.key.verifying_key().as_bytes());
}

#[tokio::test]
async fn account_rekeyed_to_hd_account_uses_its_key() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Sign);
    let accounts = vec![
        fixture.hd_account(),
        AccountInformation::standard(WATCHED, "Delegated").rekeyed_to(fixture.hd.address.clone(), None),
    ];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let item = payment(WATCHED);
    let unsigned = item.transaction.clone();
    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let signed = signer.sign_all(vec![item], &resolver, cancel).await.expect("batch signs");

    let bytes = signed[0].as_ref().expect("signed");
    let decoded = CanonicalComposer.decode_signed(bytes).expect("decodes");
    assert_eq!(decoded.sgnr.as_deref(), Some(fixture.hd.address.as_str()));
    assert_signed_by(bytes, &unsigned, &fixture.hd.public_key);
}

#[tokio::test]
async fn device_cancel_rejects_whole_batch_as_user() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Fail(LedgerError::Cancelled));
    let ledger_address = ledger.address();
    let accounts = vec![
        fixture.hd_account(),
        AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail()),
    ];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let rejection = signer
        .sign_all(vec![payment(&fixture.hd.address), payment(&ledger_address)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(rejection.response, WcTransactionErrorResponse::Rejected(WcErrorReason::User));
    assert_eq!(rejection.response.code(), 4001);
    assert!(ledger.disconnected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn device_failure_rejects_as_unsignable() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Fail(LedgerError::ClosedApp));
    let ledger_address = ledger.address();
    let accounts = vec![AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail())];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let rejection = signer
        .sign_all(vec![payment(&ledger_address)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(
        rejection.response,
        WcTransactionErrorResponse::Rejected(WcErrorReason::Unsignable)
    );
}

#[tokio::test]
async fn user_rejection_interrupts_pending_device() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Hang);
    let ledger_address = ledger.address();
    let accounts = vec![AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail())];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger));
    let user = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = reject.send(());
    };
    let (result, _) = tokio::join!(signer.sign_all(vec![payment(&ledger_address)], &resolver, cancel), user);

    let rejection = result.expect_err("batch rejected");
    assert_eq!(rejection.response, WcTransactionErrorResponse::Rejected(WcErrorReason::User));
    assert!(ledger.disconnected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn rejection_before_signing_stops_immediately() {
    let fixture = Fixture::new();
    let accounts = vec![fixture.hd_account()];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (reject, cancel) = oneshot::channel();
    reject.send(()).expect("receiver alive");
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, None::<&MockLedger>);
    let rejection = signer
        .sign_all(vec![payment(&fixture.hd.address)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(rejection.response, WcTransactionErrorResponse::Rejected(WcErrorReason::User));
}

#[tokio::test]
async fn unresponsive_device_times_out() {
    let fixture = Fixture::new();
    let ledger = MockLedger::new(DeviceBehaviour::Hang);
    let ledger_address = ledger.address();
    let accounts = vec![AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail())];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, Some(&ledger))
        .with_hardware_timeout(Duration::from_millis(20));
    let rejection = signer
        .sign_all(vec![payment(&ledger_address)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(
        rejection.response,
        WcTransactionErrorResponse::Rejected(WcErrorReason::Unsignable)
    );
    assert!(rejection.reason.contains("connect"));
}

#[tokio::test]
async fn ledger_account_without_device_is_rejected() {
    let fixture = Fixture::new();
    let ledger_address = MockLedger::new(DeviceBehaviour::Sign).address();
    let accounts = vec![AccountInformation::ledger(ledger_address.clone(), "Cold", ledger_detail())];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, None::<&MockLedger>);
    let rejection = signer
        .sign_all(vec![payment(&ledger_address)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(
        rejection.response,
        WcTransactionErrorResponse::Rejected(WcErrorReason::Unsignable)
    );
}

#[tokio::test]
async fn batch_of_watch_accounts_is_invalid_input() {
    let fixture = Fixture::new();
    let accounts = vec![AccountInformation::watch(WATCHED, "Watched")];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, None::<&MockLedger>);
    let rejection = signer
        .sign_all(vec![payment(WATCHED), payment(WATCHED)], &resolver, cancel)
        .await
        .expect_err("batch rejected");

    assert_eq!(
        rejection.response,
        WcTransactionErrorResponse::InvalidInput(WcErrorReason::Unsignable)
    );
    assert_eq!(rejection.response.code(), 4300);
}

#[tokio::test]
async fn composed_payment_keeps_its_fields_after_signing() {
    let fixture = Fixture::new();
    let accounts = vec![fixture.hd_account()];
    let resolver = AccountAuthorizationResolver::new(&accounts);

    let (_reject, cancel) = oneshot::channel();
    let signer = BatchTransactionSigner::new(&fixture.port, &fixture.store, &CanonicalComposer, None::<&MockLedger>);
    let signed = signer
        .sign_all(vec![payment(&fixture.hd.address)], &resolver, cancel)
        .await
        .expect("batch signs");

    let decoded = CanonicalComposer
        .decode_signed(signed[0].as_ref().expect("signed"))
        .expect("decodes");
    assert_eq!(decoded.sgnr, None);
    assert_eq!(decoded.txn.fee, 1_000);
    assert_eq!(decoded.txn.first_valid, 40_000_000);
    assert_eq!(decoded.txn.last_valid, 40_001_000);
    match decoded.txn.body {
        TransactionBody::Pay(fields) => {
            assert_eq!(fields.receiver, RECEIVER);
            assert_eq!(fields.amount, 250_000);
            assert_eq!(fields.close_remainder_to, None);
        }
        other => panic!("unexpected body {:?}", other),
    }
}
