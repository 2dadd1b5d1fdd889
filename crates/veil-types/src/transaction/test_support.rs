//! Shared transaction builders for tests. The signatures produced here
//! are structurally valid but not cryptographically bound; the validator
//! tests build fully signed transactions themselves.

use crate::config;
use crate::output::TransactionOutput;
use crate::transaction::{
    GenesisTransaction, RecallStakeData, StakeData, StakeRefundTransaction, TransactionBody,
    TransactionPrefix, UncommittedNormalTransaction, UncommittedRecallStakeTransaction,
    UncommittedStakeTransaction, UncommittedSuffix,
};
use curve25519_dalek::scalar::Scalar;
use veil_crypto::{
    derivation_to_scalar, derive_public_key, generate_amount_mask,
    generate_commitment_blinding_factor, generate_key_derivation, generate_keypair,
    generate_pedersen_commitment, generate_pseudo_commitments, generate_range_proof,
    generate_signature, random_hash, random_scalar, secret_key_to_public_key, sha3,
    toggle_masked_amount, ClsagSignature, KeyImage,
};

const OUTPUT_AMOUNT: u64 = 100;
const FEE: u64 = 10;

fn random_key_image() -> KeyImage {
    KeyImage::from_point(&veil_crypto::hash_to_point(random_hash().as_bytes()))
}

fn placeholder_signature() -> ClsagSignature {
    ClsagSignature {
        challenge: random_scalar(),
        responses: (0..config::transaction::RING_SIZE)
            .map(|_| random_scalar())
            .collect(),
    }
}

/// Build a balanced user body plus its full suffix.
fn build_body_and_suffix(inputs: usize, outputs: usize) -> (TransactionBody, UncommittedSuffix) {
    let amounts = vec![OUTPUT_AMOUNT; outputs];
    let blindings: Vec<Scalar> = (0..outputs).map(|_| random_scalar()).collect();

    let (range_proof, commitments) =
        generate_range_proof(&amounts, &blindings).expect("builder inputs are consistent");

    let built_outputs: Vec<TransactionOutput> = commitments
        .iter()
        .map(|commitment| {
            let (public_ephemeral, _) = generate_keypair();
            TransactionOutput::new(public_ephemeral, OUTPUT_AMOUNT, *commitment)
        })
        .collect();

    // Split the spend across the inputs; the first carries the remainder.
    let total = OUTPUT_AMOUNT * outputs as u64 + FEE;
    let mut input_amounts = vec![total / inputs as u64; inputs];
    input_amounts[0] += total % inputs as u64;

    let (pseudo_commitments, _) = generate_pseudo_commitments(&input_amounts, &blindings);

    let body = TransactionBody {
        nonce: 0,
        fee: FEE,
        key_images: (0..inputs).map(|_| random_key_image()).collect(),
        outputs: built_outputs,
    };

    let suffix = UncommittedSuffix {
        pseudo_commitments,
        ring_participants: (0..16).map(|_| random_hash()).collect(),
        signatures: (0..inputs).map(|_| placeholder_signature()).collect(),
        range_proof,
    };

    (body, suffix)
}

fn user_prefix(version: u64) -> TransactionPrefix {
    let (public_key, _) = generate_keypair();
    TransactionPrefix {
        version,
        unlock_block: 0,
        public_key,
    }
}

/// An uncommitted normal transaction that passes construction checks.
pub(crate) fn build_uncommitted_normal(
    inputs: usize,
    outputs: usize,
) -> UncommittedNormalTransaction {
    let (body, suffix) = build_body_and_suffix(inputs, outputs);
    UncommittedNormalTransaction {
        prefix: user_prefix(1),
        body,
        extra: b"test extra".to_vec(),
        suffix,
    }
}

/// An uncommitted stake transaction that passes construction checks.
pub(crate) fn build_uncommitted_stake(
    version: u64,
    stake_amount: u64,
) -> UncommittedStakeTransaction {
    let (body, suffix) = build_body_and_suffix(1, 2);
    let (candidate_public_key, _) = generate_keypair();
    let (staker_public_view_key, _) = generate_keypair();
    let (staker_public_spend_key, _) = generate_keypair();

    UncommittedStakeTransaction {
        prefix: user_prefix(version),
        body,
        data: StakeData {
            stake_amount,
            candidate_public_key,
            staker_public_view_key,
            staker_public_spend_key,
        },
        suffix,
    }
}

/// An uncommitted recall stake transaction that passes construction
/// checks.
pub(crate) fn build_uncommitted_recall_stake() -> UncommittedRecallStakeTransaction {
    let (body, suffix) = build_body_and_suffix(1, 2);
    let (candidate_public_key, _) = generate_keypair();
    let (_, view_secret) = generate_keypair();
    let (_, spend_secret) = generate_keypair();
    let digest = sha3(b"recall authorization");

    UncommittedRecallStakeTransaction {
        prefix: user_prefix(1),
        body,
        data: RecallStakeData {
            stake_amount: 100_000,
            candidate_public_key,
            staker_id: random_hash(),
            view_signature: generate_signature(&digest, &view_secret),
            spend_signature: generate_signature(&digest, &spend_secret),
        },
        suffix,
    }
}

/// The genesis transaction built from the configured material, exactly as
/// the validator expects to audit it.
pub(crate) fn build_genesis() -> GenesisTransaction {
    use config::transaction::genesis;

    let secret_key = *genesis::TX_SECRET_KEY;
    let public_spend = *genesis::DESTINATION_SPEND_KEY;
    let public_view = *genesis::DESTINATION_VIEW_KEY;

    let derivation = generate_key_derivation(&public_view, &secret_key)
        .expect("configured view key is a valid point");

    let outputs = (0..config::transaction::RING_SIZE as u64 * 2)
        .map(|index| {
            let scalar = derivation_to_scalar(&derivation, index);
            let blinding = generate_commitment_blinding_factor(&scalar);
            let mask = generate_amount_mask(&scalar);

            TransactionOutput::new(
                derive_public_key(&scalar, &public_spend)
                    .expect("configured spend key is a valid point"),
                toggle_masked_amount(mask, genesis::OUTPUT_AMOUNT),
                generate_pedersen_commitment(&blinding, genesis::OUTPUT_AMOUNT),
            )
        })
        .collect();

    GenesisTransaction {
        prefix: TransactionPrefix {
            version: 1,
            unlock_block: 0,
            public_key: secret_key_to_public_key(&secret_key),
        },
        secret_key,
        outputs,
    }
}

/// A stake refund transaction that passes construction checks.
pub(crate) fn build_stake_refund() -> StakeRefundTransaction {
    let (public_key, secret_key) = generate_keypair();
    let (public_ephemeral, _) = generate_keypair();

    StakeRefundTransaction {
        prefix: TransactionPrefix {
            version: 1,
            unlock_block: 0,
            public_key,
        },
        secret_key,
        recall_stake_tx: sha3(b"recall tx"),
        outputs: vec![TransactionOutput::new(
            public_ephemeral,
            100_000,
            generate_pedersen_commitment(&random_scalar(), 100_000),
        )],
    }
}
