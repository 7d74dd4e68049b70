use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::InvocationError;
use crate::ethereum::{
    abi::{AbiCatalog, FunctionDescriptor},
    contract::ContractReader,
    encoder,
    fees::{FeeOracle, FeeTier},
    utils, InputValues, InvocationResult, TransactionRequest,
};
use crate::signer::{SignerIdentity, SignerKind, SignerRegistry};

/// Gas ceiling attached to every write. A static cap, never estimated.
pub const GAS_LIMIT: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvocationState {
    Idle,
    FunctionSelected,
    InputsCollected,
    Dispatched,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub tier: FeeTier,
    /// Explorer URL template, `{hash}` is replaced by the transaction hash.
    pub explorer_tx_url: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tier: FeeTier::Fast,
            explorer_tx_url: "https://polygonscan.com/tx/{hash}".to_string(),
        }
    }
}

/// Drives one operator through select → edit → submit against a single
/// contract. Only one submission is in flight at a time since `submit`
/// borrows the controller mutably until it lands in a terminal state.
pub struct InvocationController {
    contract: Address,
    catalog: AbiCatalog,
    selected: Option<FunctionDescriptor>,
    inputs: InputValues,
    ether_value: Option<String>,
    settings: ControllerSettings,
    state: InvocationState,
    result: Option<InvocationResult>,
    tracking_url: Option<String>,
    reader: Arc<dyn ContractReader>,
    fees: Arc<dyn FeeOracle>,
    signers: SignerRegistry,
}

impl InvocationController {
    pub fn new(
        contract: Address,
        reader: Arc<dyn ContractReader>,
        fees: Arc<dyn FeeOracle>,
        signers: SignerRegistry,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            contract,
            catalog: AbiCatalog::default(),
            selected: None,
            inputs: InputValues::new(),
            ether_value: None,
            settings,
            state: InvocationState::Idle,
            result: None,
            tracking_url: None,
            reader,
            fees,
            signers,
        }
    }

    /// Replace the catalog wholesale. A malformed ABI leaves the catalog empty.
    pub fn load_abi(&mut self, abi_text: &str) -> Result<usize, InvocationError> {
        self.clear_selection();
        match AbiCatalog::parse(abi_text) {
            Ok(catalog) => {
                info!(
                    "Loaded ABI: {} readable, {} writable functions",
                    catalog.list_readable().len(),
                    catalog.list_writable().len()
                );
                self.catalog = catalog;
                Ok(self.catalog.len())
            }
            Err(e) => {
                warn!("{}", e);
                self.catalog = AbiCatalog::default();
                Err(e)
            }
        }
    }

    pub fn set_contract(&mut self, address: &str) -> Result<(), InvocationError> {
        self.contract = utils::validate_address(address)
            .map_err(|e| InvocationError::EncodingError(e.to_string()))?;
        Ok(())
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn catalog(&self) -> &AbiCatalog {
        &self.catalog
    }

    pub fn select_function(&mut self, name: &str) -> Result<&FunctionDescriptor, InvocationError> {
        self.clear_selection();
        let descriptor = self.catalog.describe(name)?.clone();
        debug!("Selected {} ({:?})", descriptor.signature(), descriptor.mutability);
        self.state = InvocationState::FunctionSelected;
        Ok(&*self.selected.insert(descriptor))
    }

    pub fn selected(&self) -> Option<&FunctionDescriptor> {
        self.selected.as_ref()
    }

    /// Merge one field into the current inputs.
    ///
    /// An edit after a finished attempt first returns to `FunctionSelected`,
    /// dropping the previous result and tracking link, then records the value
    /// as `InputsCollected`. Earlier inputs are kept.
    pub fn set_input(&mut self, name: &str, value: impl Into<String>) -> Result<(), InvocationError> {
        let descriptor = self.selected.as_ref().ok_or(InvocationError::NothingSelected)?;
        if !descriptor.inputs.iter().any(|input| input.name == name) {
            return Err(InvocationError::EncodingError(format!(
                "'{}' has no parameter named '{}'",
                descriptor.name, name
            )));
        }
        self.begin_edit();
        self.inputs.insert(name.to_string(), value.into());
        self.state = InvocationState::InputsCollected;
        Ok(())
    }

    /// Ether attached to a write, as a decimal string.
    pub fn set_ether_value(&mut self, ether: impl Into<String>) -> Result<(), InvocationError> {
        let descriptor = self.selected.as_ref().ok_or(InvocationError::NothingSelected)?;
        if descriptor.is_read() {
            return Err(InvocationError::EncodingError(format!(
                "'{}' is read-only and takes no value",
                descriptor.name
            )));
        }
        self.begin_edit();
        self.ether_value = Some(ether.into());
        self.state = InvocationState::InputsCollected;
        Ok(())
    }

    pub fn inputs(&self) -> &InputValues {
        &self.inputs
    }

    pub fn set_tier(&mut self, tier: FeeTier) {
        self.settings.tier = tier;
    }

    pub fn tier(&self) -> FeeTier {
        self.settings.tier
    }

    /// Switch signer. On failure the custodial signer stays active and the
    /// returned error is only a notice.
    pub async fn select_signer(&mut self, kind: SignerKind) -> Result<SignerIdentity, InvocationError> {
        self.signers.select(kind).await
    }

    pub fn signers(&self) -> &SignerRegistry {
        &self.signers
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn result(&self) -> Option<&InvocationResult> {
        self.result.as_ref()
    }

    pub fn tracking_url(&self) -> Option<&str> {
        self.tracking_url.as_deref()
    }

    /// Run the selected function and record the outcome. Never fails: errors
    /// end up as [`InvocationResult::Failed`].
    pub async fn submit(&mut self) -> &InvocationResult {
        self.tracking_url = None;

        let outcome = match self.selected.clone() {
            None => Err(InvocationError::NothingSelected),
            Some(descriptor) => {
                self.state = InvocationState::Dispatched;
                if descriptor.is_read() {
                    self.run_read(&descriptor).await
                } else {
                    self.run_write(&descriptor).await
                }
            }
        };

        let result = match outcome {
            Ok(result) => {
                self.state = InvocationState::Succeeded;
                if let Some(hash) = result.hash() {
                    let url = utils::tracking_url(&self.settings.explorer_tx_url, hash);
                    info!("Track transaction at {}", url);
                    self.tracking_url = Some(url);
                }
                result
            }
            Err(error) => {
                warn!("Invocation failed: {}", error);
                self.state = InvocationState::Failed;
                InvocationResult::Failed { error }
            }
        };

        &*self.result.insert(result)
    }

    async fn run_read(
        &self,
        descriptor: &FunctionDescriptor,
    ) -> Result<InvocationResult, InvocationError> {
        let invocation = encoder::encode_read(descriptor, &self.inputs);
        debug!("Reading {} with {:?}", invocation.function, invocation.args);

        let value = self.reader.read(self.contract, descriptor, &invocation).await?;
        Ok(InvocationResult::Read {
            function: invocation.function,
            value,
        })
    }

    async fn run_write(
        &mut self,
        descriptor: &FunctionDescriptor,
    ) -> Result<InvocationResult, InvocationError> {
        let args = encoder::ordered_args(descriptor, &self.inputs);
        let payload = encoder::encode_write(descriptor, &args, self.ether_value.as_deref())?;

        let fees = self.fees.quote(self.settings.tier).await?;
        let (signer, identity) = self.signers.active().await?;

        let tx = TransactionRequest::new(self.contract, payload, fees, GAS_LIMIT);
        info!(
            "Submitting {} via {} signer {} (tier {}, max fee {} wei)",
            descriptor.signature(),
            identity.kind,
            identity.address,
            self.settings.tier,
            tx.max_fee_per_gas
        );

        let raw = signer.submit(&tx).await?;
        Ok(InvocationResult::submitted(raw))
    }

    fn begin_edit(&mut self) {
        if matches!(self.state, InvocationState::Succeeded | InvocationState::Failed) {
            debug!("Editing after {:?}, back to FunctionSelected", self.state);
            self.state = InvocationState::FunctionSelected;
            self.result = None;
            self.tracking_url = None;
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.inputs.clear();
        self.ether_value = None;
        self.state = InvocationState::Idle;
    }
}
