//! Property checks for proposal outcomes against the quorum rule.

use proptest::prelude::*;
use sluice_governance::{Call, Deployment, DeploymentConfig, ProposalCalls, ProposalState, World};
use sluice_types::Address;

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_outcome_matches_quorum_rule(
        for_units in 0u128..50_000,
        against_units in 0u128..50_000,
        abstain_units in 0u128..50_000,
    ) {
        let mut world = World::default();
        let d = Deployment::standard(&mut world, addr("deployer"), DeploymentConfig::default()).unwrap();

        let voters = [
            (addr("for"), for_units, 1u8),
            (addr("against"), against_units, 0u8),
            (addr("abstain"), abstain_units, 2u8),
        ];
        for (voter, units, _) in voters {
            world
                .send(d.deployer, d.votes, 0, Call::VotesTransfer { from: d.deployer, to: voter, index: 0, amount: units })
                .unwrap();
            world
                .send(voter, d.votes, 0, Call::Delegate { index: 0, delegatee: voter })
                .unwrap();
        }

        let calls = ProposalCalls::single(d.store, Call::Store { value: 1 }.encode().unwrap());
        let id = world.propose(d.deployer, d.governor, 0, calls, "prop").unwrap();
        world.mine(2);
        for (voter, units, support) in voters {
            prop_assert_eq!(world.cast_vote(voter, d.governor, 0, &id, support).unwrap(), units);
        }
        world.mine(6);

        // 4% of the 1_000_000 supply
        let quorum = 40_000u128;
        let succeeded = for_units > against_units
            && for_units + against_units + abstain_units >= quorum;
        let expected = if succeeded { ProposalState::Succeeded } else { ProposalState::Defeated };
        prop_assert_eq!(world.state(&d.governor, 0, &id).unwrap(), expected);
    }
}
