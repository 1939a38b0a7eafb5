//! End-to-end governance flows: propose, vote, queue, execute.

use sluice_governance::{
    description_hash, Call, Controller, Deployment, DeploymentConfig, GovernanceError,
    ProposalCalls, ProposalState, World,
};
use sluice_types::Address;

const VOTING_DELAY: u64 = 1;
const VOTING_PERIOD: u64 = 5;
const MIN_DELAY: u64 = 3_600;
const DESCRIPTION: &str = "Proposal #1 77 in the Box!";

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn setup() -> (World, Deployment) {
    let mut world = World::default();
    let d = Deployment::standard(&mut world, addr("deployer"), DeploymentConfig::default()).unwrap();
    (world, d)
}

fn store_calls(d: &Deployment, value: u128) -> ProposalCalls {
    ProposalCalls::single(d.store, Call::Store { value }.encode().unwrap())
}

/// Propose, let the deployer vote For, and close the voting window.
fn pass(world: &mut World, d: &Deployment, index: u64, calls: &ProposalCalls, description: &str) {
    let id = world
        .propose(d.deployer, d.governor, index, calls.clone(), description)
        .unwrap();
    world.mine(VOTING_DELAY + 1);
    world.cast_vote(d.deployer, d.governor, index, &id, 1).unwrap();
    world.mine(VOTING_PERIOD + 1);
    assert_eq!(world.state(&d.governor, index, &id).unwrap(), ProposalState::Succeeded);
}

#[test]
fn test_store_value_through_governance() {
    let (mut world, d) = setup();
    let calls = store_calls(&d, 77);
    let id = world
        .propose(d.deployer, d.governor, 0, calls.clone(), DESCRIPTION)
        .unwrap();
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Pending);

    world.mine(VOTING_DELAY + 1);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Active);
    let weight = world
        .cast_vote_with_reason(d.deployer, d.governor, 0, &id, 1, "I lika do da cha cha")
        .unwrap();
    assert_eq!(weight, 1_000_000);

    world.mine(VOTING_PERIOD + 1);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Succeeded);

    let dh = description_hash(DESCRIPTION);
    let batch = world.queue(d.governor, 0, &calls, &dh).unwrap();
    assert_eq!(batch.treasury, d.root_treasury().unwrap());
    assert_eq!(batch.eta, world.timestamp() + MIN_DELAY);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Queued);

    world.advance_time(MIN_DELAY + 1);
    world.mine(1);
    world.execute(d.governor, 0, &calls, &dh).unwrap();

    assert_eq!(world.store(&d.store).unwrap().retrieve(), 77);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Executed);
}

#[test]
fn test_execute_before_eta_is_rejected() {
    let (mut world, d) = setup();
    let calls = store_calls(&d, 5);
    pass(&mut world, &d, 0, &calls, "early");
    let dh = description_hash("early");
    let batch = world.queue(d.governor, 0, &calls, &dh).unwrap();

    world.advance_time(MIN_DELAY - 1);
    assert_eq!(
        world.execute(d.governor, 0, &calls, &dh),
        Err(GovernanceError::TimelockNotElapsed {
            eta: batch.eta,
            now: world.timestamp()
        })
    );
    let id = world.governor(&d.governor).unwrap().hash_proposal(0, &calls, &dh);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Queued);
    assert_eq!(world.store(&d.store).unwrap().retrieve(), 0);

    world.advance_time(1);
    world.execute(d.governor, 0, &calls, &dh).unwrap();
    assert_eq!(
        world.execute(d.governor, 0, &calls, &dh),
        Err(GovernanceError::AlreadyExecuted(id))
    );
}

#[test]
fn test_queue_twice_and_execute_unqueued() {
    let (mut world, d) = setup();
    let calls = store_calls(&d, 9);
    pass(&mut world, &d, 0, &calls, "twice");
    let dh = description_hash("twice");

    world.advance_time(MIN_DELAY);
    assert!(matches!(
        world.execute(d.governor, 0, &calls, &dh),
        Err(GovernanceError::ProposalNotSuccessful { .. })
    ));
    world.queue(d.governor, 0, &calls, &dh).unwrap();
    assert!(matches!(
        world.queue(d.governor, 0, &calls, &dh),
        Err(GovernanceError::AlreadyQueued { .. })
    ));
}

#[test]
fn test_failing_call_reverts_whole_batch() {
    let (mut world, d) = setup();
    let root = d.root_treasury().unwrap();
    let calls = ProposalCalls::new(
        vec![d.store, d.token],
        vec![0, 0],
        vec![
            Call::Store { value: 1 }.encode().unwrap(),
            Call::TokenTransfer { to: addr("alice"), amount: 10 }.encode().unwrap(),
        ],
    );
    pass(&mut world, &d, 0, &calls, "pay alice");
    let dh = description_hash("pay alice");
    world.queue(d.governor, 0, &calls, &dh).unwrap();
    world.advance_time(MIN_DELAY);

    // the treasury holds no tokens yet
    assert!(matches!(
        world.execute(d.governor, 0, &calls, &dh),
        Err(GovernanceError::InsufficientBalance { .. })
    ));
    assert_eq!(world.store(&d.store).unwrap().retrieve(), 0);
    assert_eq!(world.treasury(&root).unwrap().timelock().pending_count(), 2);

    world
        .send(d.deployer, d.token, 0, Call::TokenTransfer { to: root, amount: 10 })
        .unwrap();
    world.execute(d.governor, 0, &calls, &dh).unwrap();
    assert_eq!(world.store(&d.store).unwrap().retrieve(), 1);
    assert_eq!(world.token(&d.token).unwrap().balance_of(&addr("alice")), 10);
}

#[test]
fn test_empty_proposal_creates_no_state() {
    let (mut world, d) = setup();
    let err = world
        .propose(d.deployer, d.governor, 0, ProposalCalls::default(), "nothing")
        .unwrap_err();
    assert_eq!(err, GovernanceError::EmptyProposal(0));
    assert_eq!(world.governor(&d.governor).unwrap().proposals(0).count(), 0);
}

#[test]
fn test_zero_weight_vote_is_recorded() {
    let (mut world, d) = setup();
    let calls = store_calls(&d, 1);
    let id = world.propose(d.deployer, d.governor, 0, calls, "zero").unwrap();
    world.mine(VOTING_DELAY + 1);

    let weight = world.cast_vote(addr("dave"), d.governor, 0, &id, 1).unwrap();
    assert_eq!(weight, 0);
    let governor = world.governor(&d.governor).unwrap();
    assert!(governor.has_voted(0, &id, &addr("dave")).unwrap());
    assert_eq!(governor.proposal_votes(0, &id).unwrap().for_votes, 0);
    assert!(matches!(
        world.cast_vote(addr("dave"), d.governor, 0, &id, 0),
        Err(GovernanceError::AlreadyVoted { .. })
    ));
}

#[test]
fn test_against_majority_cannot_queue() {
    let (mut world, d) = setup();
    world
        .send(d.deployer, d.votes, 0, Call::VotesTransfer {
            from: d.deployer,
            to: addr("carol"),
            index: 0,
            amount: 1,
        })
        .unwrap();
    world
        .send(addr("carol"), d.votes, 0, Call::Delegate { index: 0, delegatee: addr("carol") })
        .unwrap();

    let calls = store_calls(&d, 3);
    let id = world.propose(d.deployer, d.governor, 0, calls.clone(), "against").unwrap();
    world.mine(VOTING_DELAY + 1);
    assert_eq!(world.cast_vote(addr("carol"), d.governor, 0, &id, 0).unwrap(), 1);
    world.mine(VOTING_PERIOD + 1);

    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Defeated);
    assert_eq!(
        world.queue(d.governor, 0, &calls, &description_hash("against")),
        Err(GovernanceError::ProposalNotSuccessful { index: 0, id })
    );
}

#[test]
fn test_low_quorum_defeats_proposal() {
    let (mut world, d) = setup();
    // bob never delegates, so the deployer keeps 1% of the voting power
    world
        .send(d.deployer, d.votes, 0, Call::VotesTransfer {
            from: d.deployer,
            to: addr("bob"),
            index: 0,
            amount: 990_000,
        })
        .unwrap();

    let calls = store_calls(&d, 77);
    let id = world.propose(d.deployer, d.governor, 0, calls.clone(), "low").unwrap();
    world.mine(VOTING_DELAY + 1);
    assert_eq!(world.cast_vote(d.deployer, d.governor, 0, &id, 1).unwrap(), 10_000);
    world.mine(VOTING_PERIOD + 1);

    assert_eq!(world.quorum(&d.governor, 0, 2).unwrap(), 40_000);
    assert_eq!(world.state(&d.governor, 0, &id).unwrap(), ProposalState::Defeated);
    assert!(matches!(
        world.queue(d.governor, 0, &calls, &description_hash("low")),
        Err(GovernanceError::ProposalNotSuccessful { .. })
    ));
}

#[test]
fn test_votes_are_per_index() {
    let (mut world, d) = setup();
    let alice = addr("alice");
    world
        .send(d.deployer, d.votes, 0, Call::VotesMint { to: alice, index: 1, amount: 500 })
        .unwrap();
    world.mine(1);

    let ctx = world.ctx();
    let votes = world.votes(&d.votes).unwrap();
    assert_eq!(votes.get_votes(&ctx, &alice, 1, ctx.height - 1).unwrap(), 0);
    assert_eq!(votes.get_votes(&ctx, &d.deployer, 1, ctx.height - 1).unwrap(), 0);

    world
        .send(alice, d.votes, 0, Call::Delegate { index: 1, delegatee: alice })
        .unwrap();
    world.mine(1);
    let ctx = world.ctx();
    let votes = world.votes(&d.votes).unwrap();
    assert_eq!(votes.get_votes(&ctx, &alice, 1, ctx.height - 1).unwrap(), 500);
    assert_eq!(votes.get_votes(&ctx, &alice, 0, ctx.height - 1).unwrap(), 0);
}

#[test]
fn test_index_without_treasury_cannot_queue() {
    let (mut world, d) = setup();
    let alice = addr("alice");
    world
        .send(d.deployer, d.votes, 0, Call::VotesMint { to: alice, index: 3, amount: 100 })
        .unwrap();
    world
        .send(alice, d.votes, 0, Call::Delegate { index: 3, delegatee: alice })
        .unwrap();

    let calls = store_calls(&d, 3);
    let id = world.propose(alice, d.governor, 3, calls.clone(), "orphan").unwrap();
    world.mine(VOTING_DELAY + 1);
    world.cast_vote(alice, d.governor, 3, &id, 1).unwrap();
    world.mine(VOTING_PERIOD + 1);

    assert_eq!(world.state(&d.governor, 3, &id).unwrap(), ProposalState::Succeeded);
    assert_eq!(
        world.queue(d.governor, 3, &calls, &description_hash("orphan")),
        Err(GovernanceError::IndexNotConfigured(3))
    );
}

#[test]
fn test_governance_maps_new_index_and_changes_delay() {
    let (mut world, d) = setup();
    let root = d.root_treasury().unwrap();
    let calls = ProposalCalls::new(
        vec![d.registry, root],
        vec![0, 0],
        vec![
            Call::SetValve { index: 5, treasury: root }.encode().unwrap(),
            Call::UpdateDelay { delay: 60 }.encode().unwrap(),
        ],
    );
    pass(&mut world, &d, 0, &calls, "admin");
    let dh = description_hash("admin");
    world.queue(d.governor, 0, &calls, &dh).unwrap();
    world.advance_time(MIN_DELAY);
    world.execute(d.governor, 0, &calls, &dh).unwrap();

    assert_eq!(world.registry(&d.registry).unwrap().get_valve(5), root);
    assert_eq!(world.treasury(&root).unwrap().min_delay(), 60);
    // nobody else can change the delay
    assert!(world
        .send(d.deployer, root, 0, Call::UpdateDelay { delay: 0 })
        .is_err());
}

#[test]
fn test_treasury_forwards_native_value() {
    let (mut world, d) = setup();
    let root = d.root_treasury().unwrap();
    world.fund(d.deployer, 1_000);
    world.send(d.deployer, root, 1_000, Call::Deposit).unwrap();

    let calls = ProposalCalls::new(vec![addr("grantee")], vec![250], vec![Vec::new()]);
    pass(&mut world, &d, 0, &calls, "grant");
    let dh = description_hash("grant");
    world.queue(d.governor, 0, &calls, &dh).unwrap();
    world.advance_time(MIN_DELAY);
    world.execute(d.governor, 0, &calls, &dh).unwrap();

    assert_eq!(world.native_balance(&addr("grantee")), 250);
    assert_eq!(world.native_balance(&root), 750);
}
