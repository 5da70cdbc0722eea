use argon2::{Algorithm, Argon2, Params, Version};
use hex_literal::hex;

use super::*;
use crate::{
    backend::{ComputeBackend, SerialBackend, ThreadedBackend},
    cancel::CancelToken,
    hash::{PrehashInputs, blake2b_var},
};

const TEST_HEADER: [u32; 8] = [
    0x0302_0100,
    0x0706_0504,
    0x0b0a_0908,
    0x0f0e_0d0c,
    0x1312_1110,
    0x1716_1514,
    0x1b1a_1918,
    0x1f1e_1d1c,
];

fn small_config(lanes: u32, memory_cost: u32, passes: u32) -> Config {
    Config {
        lanes,
        memory_cost,
        passes,
        tag_length: 32,
        ..Config::default()
    }
}

fn filled(
    config: &Config,
    header: Option<[u32; 8]>,
    inputs: &PrehashInputs<'_>,
    backend: &dyn ComputeBackend,
) -> Memory {
    let mut memory = Memory::new(config, header).unwrap();
    FillScheduler::new(*config, backend)
        .run(&mut memory, inputs)
        .unwrap();
    memory
}

#[test]
fn matches_rfc9106_argon2d_vector() {
    let config = small_config(4, 32, 3);
    let password = [0x01u8; 32];
    let salt = [0x02u8; 16];
    let secret = [0x03u8; 8];
    let associated_data = [0x04u8; 12];
    let inputs = PrehashInputs {
        password: &password,
        salt: &salt,
        secret: &secret,
        associated_data: &associated_data,
    };

    let memory = filled(&config, None, &inputs, &SerialBackend);

    assert_eq!(
        memory.finalize(32),
        hex!("512b391b6f1162975371d30919734294 f868e3be3984f3c1a13a4db9fabe4acb")
    );
}

#[test]
fn plain_fill_matches_argon2_crate() {
    let password = b"password";
    let salt = b"somesalt";
    let inputs = PrehashInputs {
        password,
        salt,
        ..PrehashInputs::default()
    };

    let shapes = [(1, 8, 1), (1, 16, 1), (1, 64, 2), (2, 32, 2), (3, 50, 1), (4, 64, 3)];
    for (lanes, memory_cost, passes) in shapes {
        let config = small_config(lanes, memory_cost, passes);
        let memory = filled(&config, None, &inputs, &ThreadedBackend::new(4));

        let params = Params::new(memory_cost, passes, lanes, Some(32)).unwrap();
        let reference = Argon2::new(Algorithm::Argon2d, Version::V0x13, params);
        let mut expected = [0u8; 32];
        reference
            .hash_password_into(password, salt, &mut expected)
            .unwrap();

        assert_eq!(
            memory.finalize(32),
            expected,
            "lanes={lanes} memory_cost={memory_cost} passes={passes}"
        );
    }
}

#[test]
fn fill_is_deterministic() {
    let config = small_config(2, 64, 2);
    let inputs = PrehashInputs::for_header(&[0u8; 80]);

    let first = filled(&config, Some(TEST_HEADER), &inputs, &SerialBackend);
    let second = filled(&config, Some(TEST_HEADER), &inputs, &SerialBackend);

    assert!(first.blocks() == second.blocks());
    assert_eq!(first.finalize(32), second.finalize(32));
}

#[test]
fn serial_and_threaded_fills_are_identical() {
    let header_bytes: Vec<u8> = (0..80).collect();
    let inputs = PrehashInputs::for_header(&header_bytes);

    for (lanes, passes) in [(2, 1), (4, 2), (3, 3)] {
        let config = small_config(lanes, 16 * lanes, passes);
        let serial = filled(&config, Some(TEST_HEADER), &inputs, &SerialBackend);
        for threads in [2, lanes as usize, 16] {
            let threaded = filled(
                &config,
                Some(TEST_HEADER),
                &inputs,
                &ThreadedBackend::new(threads),
            );
            assert!(
                serial.blocks() == threaded.blocks(),
                "lanes={lanes} passes={passes} threads={threads}"
            );
        }
    }
}

#[test]
fn header_binding_changes_every_computed_block() {
    let config = small_config(2, 32, 1);
    let inputs = PrehashInputs::for_header(&[7u8; 80]);

    let plain = filled(&config, None, &inputs, &SerialBackend);
    let bound = filled(&config, Some(TEST_HEADER), &inputs, &SerialBackend);
    let geometry = *plain.geometry();

    for index in 0..geometry.block_count() {
        if geometry.is_seed(index) {
            assert_eq!(plain.get(index), bound.get(index), "seed {index}");
        } else {
            assert_ne!(plain.get(index), bound.get(index), "block {index}");
        }
    }
}

#[test]
fn toy_memory_chains_from_seeds() {
    // lanes = 1, passes = 1, segment_length = 4
    let config = small_config(1, 16, 1);
    let inputs = PrehashInputs::for_header(&[0u8; 80]);
    let memory = filled(&config, Some(TEST_HEADER), &inputs, &SerialBackend);

    assert_eq!(memory.geometry().segment_length, 4);
    assert_eq!(memory.len(), 16);

    let h0 = crate::hash::prehash(&config, &inputs);
    assert_eq!(memory.get(0), Some(&seed_block(&h0, 0, 0)));
    assert_eq!(memory.get(1), Some(&seed_block(&h0, 0, 1)));

    // block 2 can only reference block 0
    let mut expected = Block::ZERO;
    fill_block(
        memory.get(1).unwrap(),
        memory.get(0).unwrap(),
        &mut expected,
        false,
        memory.binding(2),
    );
    assert_eq!(memory.get(2), Some(&expected));

    // every later block is reproducible from its predecessor and its reference
    let geometry = *memory.geometry();
    for index in 3..memory.len() {
        let position = geometry.locate(index);
        let prev = memory.get(index - 1).unwrap();
        let reference = reference_block(&geometry, position, prev.first_word());
        let mut expected = Block::ZERO;
        fill_block(
            prev,
            memory.get(reference).unwrap(),
            &mut expected,
            false,
            memory.binding(index),
        );
        assert_eq!(memory.get(index), Some(&expected), "block {index}");
    }

    let mut tag = [0u8; 32];
    crate::hash::long_hash(&[&memory.get(15).unwrap().to_bytes()], &mut tag);
    assert_eq!(memory.finalize(32), tag);
}

#[test]
fn scheduler_walks_its_states() {
    let config = small_config(2, 16, 1);
    let inputs = PrehashInputs::for_header(&[1u8; 80]);
    let mut memory = Memory::new(&config, None).unwrap();
    let mut scheduler = FillScheduler::new(config, &SerialBackend);

    assert_eq!(scheduler.state(), FillState::Uninitialized);
    assert!(matches!(
        scheduler.fill(&mut memory),
        Err(PowError::Parameter(_))
    ));

    scheduler.seed(&mut memory, &inputs).unwrap();
    assert_eq!(scheduler.state(), FillState::SeedsWritten);
    assert!(scheduler.seed(&mut memory, &inputs).is_err());

    scheduler.fill(&mut memory).unwrap();
    assert_eq!(scheduler.state(), FillState::Complete);
}

#[test]
fn cancelled_fill_stops_at_the_next_sync_point() {
    let config = small_config(2, 32, 1);
    let inputs = PrehashInputs::for_header(&[2u8; 80]);
    let mut memory = Memory::new(&config, None).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut scheduler = FillScheduler::new(config, &SerialBackend).with_cancel(&cancel);
    let result = scheduler.run(&mut memory, &inputs);

    assert!(matches!(result, Err(PowError::Cancelled)));
    assert_eq!(scheduler.state(), FillState::Filling { pass: 0, slice: 0 });
    // nothing past the seeds was written
    assert_eq!(memory.get(2), Some(&Block::ZERO));
}

#[test]
fn rejects_invalid_configuration_before_allocating() {
    let config = small_config(0, 16, 1);
    assert!(matches!(
        Memory::new(&config, None),
        Err(PowError::Parameter(_))
    ));

    let config = small_config(4, 16, 1);
    assert!(matches!(
        Memory::new(&config, None),
        Err(PowError::Parameter(_))
    ));
}

#[test]
fn scheduler_rejects_mismatched_memory() {
    let memory_config = small_config(2, 32, 1);
    let scheduler_config = small_config(2, 64, 1);
    let mut memory = Memory::new(&memory_config, None).unwrap();

    let mut scheduler = FillScheduler::new(scheduler_config, &SerialBackend);
    assert!(matches!(
        scheduler.seed(&mut memory, &PrehashInputs::default()),
        Err(PowError::Parameter(_))
    ));
}

#[test]
fn toy_vector_matches_golden() {
    // all-zero 80-byte header, lanes = 1, passes = 1, segment_length = 4
    let config = small_config(1, 16, 1);
    let header = [0u8; 80];
    let challenge_id = crate::challenge_id::ChallengeId::from_header(&header);
    assert_eq!(
        challenge_id.bytes,
        hex!("143aa0da2b6a4ca39eee3ee50a6536d7 5eedff3b5ef0229a6d603afa7854d5b8")
    );

    let memory = filled(
        &config,
        Some(challenge_id.header_words()),
        &PrehashInputs::for_header(&header),
        &SerialBackend,
    );

    let last = memory.get(15).unwrap().to_bytes();
    assert_eq!(
        last[..32],
        hex!("494f6694169ed55019cadcfd156bfcbd d483f1a3c225204af1da85fc97306665")
    );
    // the whole final block, through Blake2b-256
    let mut digest = [0u8; 32];
    blake2b_var(&[last.as_slice()], &mut digest);
    assert_eq!(
        digest,
        hex!("4f813847f011094aa3e97904045c2748 53442d0f80a22ebb8fdc06026fa4f733")
    );
    assert_eq!(
        memory.finalize(32),
        hex!("b27ceb15b475f73c8abf4f0475d910e5 98a6bec4a46bf729769efccc2abd35ef")
    );
}
