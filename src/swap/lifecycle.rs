//! Lifecycle processors: fresh state, build, dispatch
//!
//! Each call runs inside its own span tagged with a correlation id and
//! reports its outcome to the `swap_lifecycle_calls_total` counter.

use crate::context::SwapContext;
use crate::errors::{SwapError, SwapResult};
use crate::metrics::{metrics, Timer};
use crate::observability::{lifecycle_span, CorrelationId};
use crate::swap::identity::SwapIdentity;
use crate::swap::initialize::{build_initialize, SwapInfo};
use crate::swap::{build_cancel, build_claim, build_deposit, build_modify};
use crate::tx_builder::{group_kinds, DispatchOptions, OperationGroup};
use crate::types::SwapItem;
use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::Signer};
use std::future::Future;
use tracing::{debug, info, warn, Instrument, Span};

/// Result of [`initialize_swap`]
#[derive(Debug, Clone)]
pub struct InitializedSwap {
    pub identity: SwapIdentity,
    pub signatures: Vec<Signature>,
}

async fn observed<T, F>(operation: &'static str, call: F) -> SwapResult<T>
where
    F: Future<Output = SwapResult<T>>,
{
    let correlation_id = CorrelationId::new();
    let span = lifecycle_span(operation, &correlation_id);
    let result = call.instrument(span.clone()).await;

    metrics().record_lifecycle(operation, result.is_ok());
    if let Err(e) = &result {
        span.in_scope(|| {
            warn!(
                category = e.category(),
                retryable = e.is_retryable(),
                error = %e,
                "Lifecycle call failed"
            )
        });
    }
    result
}

async fn build_then_dispatch<B>(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &dyn Signer,
    options: &DispatchOptions,
    build: B,
) -> SwapResult<Vec<Signature>>
where
    B: Future<Output = SwapResult<Vec<OperationGroup>>>,
{
    Span::current().record("swap", tracing::field::display(address));
    let timer = Timer::new();
    let groups = build.await?;
    timer.observe_duration(&metrics().build_latency);

    debug!(groups = ?group_kinds(&groups), "Dispatching");
    let signatures = ctx.dispatcher().dispatch(groups, signer, options).await?;
    info!(transactions = signatures.len(), "Lifecycle call complete");
    Ok(signatures)
}

/// Create the swap account and register its items
///
/// A dispatch failure is reported as [`SwapError::Initialization`] carrying
/// the derived address, so a later call can resume.
pub async fn initialize_swap(
    ctx: &SwapContext,
    info: &SwapInfo,
    signer: &dyn Signer,
    options: &DispatchOptions,
) -> SwapResult<InitializedSwap> {
    observed("initialize", async {
        let timer = Timer::new();
        let plan = build_initialize(ctx, info, &signer.pubkey()).await?;
        timer.observe_duration(&metrics().build_latency);

        let address = plan.identity.address;
        Span::current().record("swap", tracing::field::display(&address));
        info!(
            resumed = plan.resumed,
            groups = ?group_kinds(&plan.groups),
            "Initializing swap"
        );

        let signatures = ctx
            .dispatcher()
            .dispatch(plan.groups, signer, options)
            .await
            .map_err(|e| SwapError::Initialization {
                address: address.to_string(),
                source: Box::new(e),
            })?;
        Ok(InitializedSwap {
            identity: plan.identity,
            signatures,
        })
    })
    .await
}

/// Escrow every pending item the signer owns
pub async fn deposit_swap(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &dyn Signer,
    options: &DispatchOptions,
) -> SwapResult<Vec<Signature>> {
    let party = signer.pubkey();
    observed(
        "deposit",
        build_then_dispatch(ctx, address, signer, options, build_deposit(ctx, address, &party)),
    )
    .await
}

pub async fn claim_and_close_swap(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &dyn Signer,
    skip_finalize: bool,
    options: &DispatchOptions,
) -> SwapResult<Vec<Signature>> {
    let party = signer.pubkey();
    observed(
        "claim",
        build_then_dispatch(
            ctx,
            address,
            signer,
            options,
            build_claim(ctx, address, &party, skip_finalize),
        ),
    )
    .await
}

pub async fn cancel_and_close_swap(
    ctx: &SwapContext,
    address: &Pubkey,
    signer: &dyn Signer,
    skip_finalize: bool,
    options: &DispatchOptions,
) -> SwapResult<Vec<Signature>> {
    let party = signer.pubkey();
    observed(
        "cancel",
        build_then_dispatch(
            ctx,
            address,
            signer,
            options,
            build_cancel(ctx, address, &party, skip_finalize),
        ),
    )
    .await
}

pub async fn modify_swap(
    ctx: &SwapContext,
    address: &Pubkey,
    desired: &[SwapItem],
    signer: &dyn Signer,
    options: &DispatchOptions,
) -> SwapResult<Vec<Signature>> {
    let party = signer.pubkey();
    observed(
        "modify",
        build_then_dispatch(
            ctx,
            address,
            signer,
            options,
            build_modify(ctx, address, &party, desired),
        ),
    )
    .await
}
