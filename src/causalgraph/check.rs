use crate::rle::{HasLength, RleSpanHelpers};
use crate::CausalGraph;

impl CausalGraph {
    /// Panic unless every structural invariant holds:
    ///
    /// - the entry list is dense from LV 0 and maximally merged,
    /// - every parent points strictly backwards,
    /// - the two identity indexes agree in both directions,
    /// - the stored version equals the replayed frontier.
    ///
    /// `deep` additionally re-checks the identity mapping from the per-agent
    /// side. Test / debugging use only.
    #[allow(unused)]
    pub fn dbg_check(&self, deep: bool) {
        self.graph.dbg_check();

        let aa = &self.agent_assignment;
        aa.client_with_lv.check_packed_from_0();
        aa.client_with_lv.check_fully_merged();
        assert_eq!(aa.client_with_lv.end(), self.graph.len());

        for client in aa.client_data.iter() {
            client.item_times.check_ordered();
            client.item_times.check_fully_merged();
        }

        // Every identity span must map back through the per-agent index to
        // exactly the local versions it was assigned.
        for pair in aa.client_with_lv.iter() {
            let client = &aa.client_data[pair.1.agent as usize];

            let mut seq_range = pair.1.seq_range;
            let mut expect_lv = pair.0;
            while !seq_range.is_empty() {
                let lv_span = client
                    .try_seq_to_lv_span(seq_range)
                    .expect("seq range missing from client data");
                assert_eq!(lv_span.start, expect_lv);
                expect_lv += lv_span.len();
                seq_range.start += lv_span.len();
            }
        }

        if deep {
            // And the other way around.
            for (agent, client) in aa.client_data.iter().enumerate() {
                for pair in client.item_times.iter() {
                    let mut lv_range = pair.1;
                    let mut expect_seq = pair.0;
                    while !lv_range.is_empty() {
                        let (found, offset) = aa.client_with_lv.find_packed_with_offset(lv_range.start);
                        assert_eq!(found.1.agent as usize, agent);
                        assert_eq!(found.1.seq_range.start + offset, expect_seq);

                        let len_here = (found.end() - lv_range.start).min(lv_range.len());
                        expect_seq += len_here;
                        lv_range.start += len_here;
                    }
                }
            }
        }

        assert_eq!(self.version, self.graph.dbg_get_frontier_inefficiently());
    }
}
