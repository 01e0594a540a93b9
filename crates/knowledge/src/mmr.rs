//! Maximal marginal relevance (MMR) ranking.
//!
//! Picks `k` items from a candidate pool, each step maximising
//! `lambda * sim(query, d) - (1 - lambda) * max(sim(d, s) for s in selected)`.

/// Cosine similarity; 0.0 when either vector is zero or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Indices of the `fetch_k` candidates most similar to `query`, best first.
pub fn top_candidates(query: &[f32], embeddings: &[Vec<f32>], fetch_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query, e)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(fetch_k).map(|(i, _)| i).collect()
}

/// Select up to `k` indices from `candidates` using MMR.
///
/// Returned indices refer to `embeddings` and are in selection order.
pub fn mmr_select(
    query: &[f32],
    embeddings: &[Vec<f32>],
    candidates: &[usize],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|&i| cosine_similarity(query, &embeddings[i]))
        .collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &cand) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| {
                    cosine_similarity(&embeddings[candidates[cand]], &embeddings[candidates[s]])
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = lambda * relevance[cand] - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected.into_iter().map(|pos| candidates[pos]).collect()
}
